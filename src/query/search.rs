//! Free-text search over task fields.

use crate::types::Task;

/// Case-insensitive substring match across title, body, project, context
/// and tag names. An empty query matches everything.
pub fn matches(task: &Task, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    contains(&task.title)
        || contains(&task.body)
        || task.project.as_deref().is_some_and(contains)
        || task.context.as_deref().is_some_and(contains)
        || task.tags.iter().any(|tag| contains(tag))
}
