//! Core record types: tasks, boards and the criteria-set filter.

use crate::query::Filter;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Whether a record is an actionable task or a reference note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    #[default]
    Task,
    Note,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Task => "task",
            TaskKind::Note => "note",
        }
    }
}

/// GTD lifecycle status. `Completed` is terminal but reversible.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Inbox,
    NextAction,
    Waiting,
    Someday,
    Completed,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Inbox,
        Status::NextAction,
        Status::Waiting,
        Status::Someday,
        Status::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Inbox => "inbox",
            Status::NextAction => "next-action",
            Status::Waiting => "waiting",
            Status::Someday => "someday",
            Status::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "inbox" => Some(Status::Inbox),
            "next-action" | "next" => Some(Status::NextAction),
            "waiting" => Some(Status::Waiting),
            "someday" => Some(Status::Someday),
            "completed" | "done" => Some(Status::Completed),
            _ => None,
        }
    }

    /// Display label used for grouping and board columns.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Inbox => "Inbox",
            Status::NextAction => "Next Actions",
            Status::Waiting => "Waiting For",
            Status::Someday => "Someday/Maybe",
            Status::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority, totally ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Parse a priority string ("high", "medium", "low").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a task on a freeform board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A file or link attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub uri: String,
}

/// A task (or note) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub title: String,
    pub body: String,
    pub status: Status,
    pub project: Option<String>,
    pub context: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub defer: Option<DateTime<Utc>>,
    pub flagged: bool,
    pub priority: Priority,
    pub effort_minutes: Option<u32>,
    /// Board id to position; only honored by freeform boards.
    pub positions: BTreeMap<String, Position>,
    pub tags: BTreeSet<String>,
    pub attachments: Vec<Attachment>,
    pub parent_id: Option<Uuid>,
    pub children: Vec<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Task {
    /// Create an inbox task with a fresh id, stamped now.
    pub fn new(title: impl Into<String>) -> Self {
        Self::new_at(title, Utc::now())
    }

    pub fn new_at(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TaskKind::Task,
            title: title.into(),
            body: String::new(),
            status: Status::Inbox,
            project: None,
            context: None,
            due: None,
            defer: None,
            flagged: false,
            priority: Priority::Medium,
            effort_minutes: None,
            positions: BTreeMap::new(),
            tags: BTreeSet::new(),
            attachments: Vec::new(),
            parent_id: None,
            children: Vec::new(),
            completed_at: None,
            created: now,
            modified: now,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn flagged(mut self) -> Self {
        self.flagged = true;
        self
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.modified = now;
    }

    /// Move to the terminal status, recording when.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = Status::Completed;
        self.completed_at = Some(now);
        self.modified = now;
    }

    /// Reopen a completed task into the given active status.
    pub fn reopen(&mut self, status: Status, now: DateTime<Utc>) {
        self.status = if status.is_terminal() {
            Status::NextAction
        } else {
            status
        };
        self.completed_at = None;
        self.modified = now;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_deferred(&self, now: DateTime<Utc>) -> bool {
        self.defer.is_some_and(|defer| now < defer)
    }

    /// Active, not deferred, and an actual task rather than a note.
    pub fn is_actionable(&self, now: DateTime<Utc>) -> bool {
        self.kind == TaskKind::Task && !self.is_terminal() && !self.is_deferred(now)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && self.due.is_some_and(|due| due < now)
    }

    /// Due on the same local calendar day as `now`.
    pub fn is_due_today(&self, now: DateTime<Utc>) -> bool {
        let today = now.with_timezone(&Local).date_naive();
        self.due
            .is_some_and(|due| due.with_timezone(&Local).date_naive() == today)
    }
}

/// Board type: governs auto-creation and auto-hide eligibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardType {
    Status,
    Project,
    Context,
    #[default]
    Custom,
}

/// Board layout: governs custom positions and fixed columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardLayout {
    Freeform,
    #[default]
    Kanban,
    Grid,
}

impl BoardLayout {
    pub fn requires_columns(&self) -> bool {
        matches!(self, BoardLayout::Kanban | BoardLayout::Grid)
    }

    pub fn honors_positions(&self) -> bool {
        matches!(self, BoardLayout::Freeform)
    }
}

/// A board column: a titled sub-filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Filter::is_empty")]
    pub filter: Filter,
}

impl Column {
    pub fn new(id: impl Into<String>, title: impl Into<String>, filter: Filter) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            filter,
        }
    }
}

/// A board record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub title: Option<String>,
    pub board_type: BoardType,
    pub layout: BoardLayout,
    pub filter: Filter,
    pub columns: Option<Vec<Column>>,
    pub visible: bool,
    pub auto_hide_days: Option<u32>,
    pub built_in: bool,
    pub body: String,
}

impl Board {
    pub fn new(id: impl Into<String>, board_type: BoardType, layout: BoardLayout) -> Self {
        Self {
            id: id.into(),
            title: None,
            board_type,
            layout,
            filter: Filter::default(),
            columns: None,
            visible: true,
            auto_hide_days: None,
            built_in: false,
            body: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Project and context boards are created automatically.
    pub fn is_auto_created(&self) -> bool {
        matches!(self.board_type, BoardType::Project | BoardType::Context)
    }

    /// Auto-created boards with a threshold hide after that many days
    /// without activity.
    pub fn should_auto_hide(&self, last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.auto_hide_days {
            Some(days) if self.is_auto_created() && !self.built_in => {
                now.signed_duration_since(last_activity) > chrono::Duration::days(i64::from(days))
            }
            _ => false,
        }
    }

    /// Explicit columns, or the type defaults when the layout needs them.
    pub fn effective_columns(&self, projects: &[String], contexts: &[String]) -> Vec<Column> {
        if let Some(columns) = &self.columns {
            return columns.clone();
        }
        if !self.layout.requires_columns() {
            return Vec::new();
        }
        match self.board_type {
            BoardType::Status => Status::ALL
                .iter()
                .map(|status| {
                    Column::new(
                        status.as_str(),
                        status.label(),
                        Filter {
                            status: Some(*status),
                            ..Filter::default()
                        },
                    )
                })
                .collect(),
            BoardType::Project => {
                let mut columns: Vec<Column> = projects
                    .iter()
                    .map(|p| {
                        Column::new(
                            p.clone(),
                            p.clone(),
                            Filter {
                                project: Some(p.clone()),
                                ..Filter::default()
                            },
                        )
                    })
                    .collect();
                columns.push(Column::new("no-project", "No Project", Filter::default()));
                columns
            }
            BoardType::Context => {
                let mut columns: Vec<Column> = contexts
                    .iter()
                    .map(|c| {
                        Column::new(
                            c.clone(),
                            c.clone(),
                            Filter {
                                context: Some(c.clone()),
                                ..Filter::default()
                            },
                        )
                    })
                    .collect();
                columns.push(Column::new("no-context", "No Context", Filter::default()));
                columns
            }
            BoardType::Custom => vec![Column::new("all", "All", Filter::default())],
        }
    }
}
