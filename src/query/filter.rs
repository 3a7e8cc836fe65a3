//! Simple criteria-set filter embedded in boards and columns.

use crate::types::{Priority, Status, Task};
use serde::{Deserialize, Serialize};

/// Unordered set of optional equality/range constraints. A task matches
/// when every specified constraint holds; an empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_effort: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_effort: Option<u32>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        *self == Filter::default()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if let Some(ref project) = self.project
            && task.project.as_deref() != Some(project.as_str())
        {
            return false;
        }
        if let Some(ref context) = self.context
            && task.context.as_deref() != Some(context.as_str())
        {
            return false;
        }
        if self.flagged.is_some_and(|f| f != task.flagged) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if let Some(min) = self.min_effort
            && !task.effort_minutes.is_some_and(|e| e >= min)
        {
            return false;
        }
        if let Some(max) = self.max_effort
            && !task.effort_minutes.is_some_and(|e| e <= max)
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        let mut task = Task::new("Plan trip")
            .with_status(Status::NextAction)
            .with_project("Holiday")
            .with_context("@computer")
            .with_priority(Priority::High);
        task.effort_minutes = Some(30);
        task
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::default().matches(&sample()));
        assert!(Filter::default().matches(&Task::new("bare")));
    }

    #[test]
    fn all_specified_fields_must_hold() {
        let filter = Filter {
            status: Some(Status::NextAction),
            project: Some("Holiday".to_string()),
            priority: Some(Priority::High),
            ..Filter::default()
        };
        assert!(filter.matches(&sample()));

        let wrong_project = Filter {
            project: Some("Work".to_string()),
            ..filter.clone()
        };
        assert!(!wrong_project.matches(&sample()));
    }

    #[test]
    fn effort_bounds_are_inclusive() {
        let filter = Filter {
            min_effort: Some(30),
            max_effort: Some(30),
            ..Filter::default()
        };
        assert!(filter.matches(&sample()));
        assert!(!filter.matches(&Task::new("no estimate")));
    }

    #[test]
    fn flagged_constraint_checks_both_ways() {
        let filter = Filter {
            flagged: Some(false),
            ..Filter::default()
        };
        assert!(filter.matches(&sample()));
        assert!(!filter.matches(&sample().flagged()));
    }
}
