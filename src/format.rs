//! Output formatting utilities for markdown and JSON.

use crate::perspective::Perspective;
use crate::query::TaskGroup;
use crate::store::CheckIssue;
use crate::types::{Priority, Task};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Format a single task as markdown.
pub fn format_task_markdown(task: &Task) -> String {
    let mut md = String::new();

    md.push_str(&format!("## {}\n", task.title));
    md.push_str(&format!("- **id**: `{}`\n", task.id));
    md.push_str(&format!("- **status**: {}\n", task.status));
    md.push_str(&format!("- **priority**: {}\n", task.priority));

    if let Some(ref project) = task.project {
        md.push_str(&format!("- **project**: {}\n", project));
    }
    if let Some(ref context) = task.context {
        md.push_str(&format!("- **context**: {}\n", context));
    }
    if let Some(due) = task.due {
        md.push_str(&format!("- **due**: {}\n", due.format("%Y-%m-%d %H:%M")));
    }
    if let Some(defer) = task.defer {
        md.push_str(&format!("- **deferred until**: {}\n", defer.format("%Y-%m-%d %H:%M")));
    }
    if let Some(minutes) = task.effort_minutes {
        md.push_str(&format!("- **effort**: {} min\n", minutes));
    }
    if !task.tags.is_empty() {
        let tags: Vec<&str> = task.tags.iter().map(String::as_str).collect();
        md.push_str(&format!("- **tags**: {}\n", tags.join(", ")));
    }
    if let Some(completed) = task.completed_at {
        md.push_str(&format!("- **completed**: {}\n", completed.format("%Y-%m-%d %H:%M")));
    }

    if !task.body.trim().is_empty() {
        md.push('\n');
        md.push_str(task.body.trim_end());
        md.push('\n');
    }

    md
}

/// Format a task in short form for lists.
fn format_task_short(task: &Task) -> String {
    let priority_marker = match task.priority {
        Priority::High => "!!! ",
        Priority::Medium | Priority::Low => "",
    };
    let flag = if task.flagged { " ⚑" } else { "" };
    let check = if task.is_terminal() { "x" } else { " " };
    let context = task
        .context
        .as_ref()
        .map(|c| format!(" {}", c))
        .unwrap_or_default();
    let id = task.id.to_string();

    format!(
        "- [{}] {}{}{} `{}`{}\n",
        check,
        priority_marker,
        task.title,
        flag,
        &id[..8],
        context,
    )
}

/// Format a flat list of tasks.
pub fn format_tasks_markdown(title: &str, tasks: &[Task]) -> String {
    let mut md = format!("# {} ({})\n\n", title, tasks.len());
    for task in tasks {
        md.push_str(&format_task_short(task));
    }
    md
}

/// Format grouped tasks, one section per group.
pub fn format_groups_markdown(title: &str, groups: &[TaskGroup]) -> String {
    let total: usize = groups.iter().map(|g| g.tasks.len()).sum();
    let mut md = format!("# {} ({})\n\n", title, total);
    for group in groups {
        md.push_str(&format!("## {}\n\n", group.key));
        for task in &group.tasks {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }
    md
}

pub fn format_perspectives_markdown(perspectives: &[Perspective]) -> String {
    let mut md = format!("# Perspectives ({})\n\n", perspectives.len());
    for p in perspectives {
        let built_in = if p.built_in { " (built-in)" } else { "" };
        md.push_str(&format!(
            "- **{}**{} `{}` {} rule(s)\n",
            p.name,
            built_in,
            p.id,
            p.rules.rules.len()
        ));
    }
    md
}

pub fn format_names_markdown(title: &str, names: &[String]) -> String {
    let mut md = format!("# {} ({})\n\n", title, names.len());
    for name in names {
        md.push_str(&format!("- {}\n", name));
    }
    md
}

pub fn format_check_markdown(category: &str, issues: &[CheckIssue]) -> String {
    if issues.is_empty() {
        return format!("{}: ok\n", category);
    }
    let mut md = format!("{}: {} problem(s)\n", category, issues.len());
    for issue in issues {
        md.push_str(&format!("- `{}`: {}\n", issue.path.display(), issue.error));
    }
    md
}

/// JSON rendering of a check result.
pub fn check_to_json(category: &str, issues: &[CheckIssue]) -> Value {
    serde_json::json!({
        "category": category,
        "issues": issues
            .iter()
            .map(|i| serde_json::json!({
                "path": i.path.display().to_string(),
                "code": i.error.code(),
                "message": i.error.to_string(),
            }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_md_alias() {
        assert_eq!(OutputFormat::parse("MD"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }

    #[test]
    fn short_form_marks_completion_and_priority() {
        let mut task = Task::new("Renew insurance").with_priority(Priority::High);
        task.complete(chrono::Utc::now());
        let line = format_task_short(&task);
        assert!(line.starts_with("- [x] !!! Renew insurance `"));
    }

    #[test]
    fn full_form_includes_body() {
        let task = Task::new("Plan").with_project("Home").with_body("details here\n");
        let md = format_task_markdown(&task);
        assert!(md.contains("- **project**: Home\n"));
        assert!(md.ends_with("\ndetails here\n"));
    }
}
