//! Sorting and grouping of task lists.

use crate::types::{Status, Task};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Title,
    Priority,
    Created,
    Modified,
    Status,
    Due,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "title" => Some(SortKey::Title),
            "priority" => Some(SortKey::Priority),
            "created" => Some(SortKey::Created),
            "modified" => Some(SortKey::Modified),
            "status" => Some(SortKey::Status),
            "due" => Some(SortKey::Due),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Compare two tasks by key. Tasks without a due date sort last in either
/// direction; ties fall back to creation time then id.
pub fn compare(a: &Task, b: &Task, key: SortKey, direction: SortDirection) -> Ordering {
    let primary = match key {
        SortKey::Title => direction.apply(
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title)),
        ),
        SortKey::Priority => direction.apply(a.priority.cmp(&b.priority)),
        SortKey::Created => direction.apply(a.created.cmp(&b.created)),
        SortKey::Modified => direction.apply(a.modified.cmp(&b.modified)),
        SortKey::Status => direction.apply(a.status.cmp(&b.status)),
        SortKey::Due => match (a.due, b.due) {
            (Some(x), Some(y)) => direction.apply(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    primary
        .then_with(|| a.created.cmp(&b.created))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_tasks(tasks: &mut [Task], key: SortKey, direction: SortDirection) {
    tasks.sort_by(|a, b| compare(a, b, key, direction));
}

/// Bucketing key for display grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupBy {
    #[default]
    None,
    Status,
    Project,
    Context,
    Priority,
    Flagged,
}

/// A named bucket of tasks, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskGroup {
    pub key: String,
    pub tasks: Vec<Task>,
}

fn status_rank(status: Status) -> u8 {
    Status::ALL
        .iter()
        .position(|s| *s == status)
        .map(|p| p as u8)
        .unwrap_or(u8::MAX)
}

/// (rank, label) for a task under a grouping; groups order by rank, then label.
fn bucket(task: &Task, group_by: GroupBy) -> (u8, String) {
    match group_by {
        GroupBy::None => (0, "All".to_string()),
        GroupBy::Status => (status_rank(task.status), task.status.label().to_string()),
        GroupBy::Project => match task.project.as_deref().filter(|p| !p.is_empty()) {
            Some(project) => (0, project.to_string()),
            None => (1, "No Project".to_string()),
        },
        GroupBy::Context => match task.context.as_deref().filter(|c| !c.is_empty()) {
            Some(context) => (0, context.to_string()),
            None => (1, "No Context".to_string()),
        },
        // High first.
        GroupBy::Priority => (2 - task.priority as u8, task.priority.as_str().to_string()),
        GroupBy::Flagged => {
            if task.flagged {
                (0, "Flagged".to_string())
            } else {
                (1, "Not Flagged".to_string())
            }
        }
    }
}

/// Partition into buckets, preserving the input order inside each bucket.
pub fn group_tasks(tasks: Vec<Task>, group_by: GroupBy) -> Vec<TaskGroup> {
    let mut buckets: BTreeMap<(u8, String), Vec<Task>> = BTreeMap::new();
    for task in tasks {
        buckets.entry(bucket(&task, group_by)).or_default().push(task);
    }
    buckets
        .into_iter()
        .map(|((_, key), tasks)| TaskGroup { key, tasks })
        .collect()
}
