//! Task records: on-disk metadata shape and the task query surface.

use super::{Record, RecordStore};
use crate::activity::{self, ActivityKind};
use crate::error::{FrontmatterError, StoreError, StoreResult};
use crate::frontmatter;
use crate::paths::{self, Category};
use crate::query::{Filter, RuleSet, SortDirection, SortKey, search, sort_tasks};
use crate::types::{Attachment, Position, Priority, Status, Task, TaskKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use uuid::Uuid;

const EMPTY_TITLE: &str = "title must not be empty";

/// Frontmatter fields of a task file, in the order they are written.
/// Fields without `default` are required.
#[derive(Debug, Serialize, Deserialize)]
struct TaskMetadata {
    id: Uuid,
    kind: TaskKind,
    title: String,
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    defer: Option<DateTime<Utc>>,
    flagged: bool,
    priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    effort_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    positions: BTreeMap<String, Position>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl From<&Task> for TaskMetadata {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            kind: task.kind,
            title: task.title.clone(),
            status: task.status,
            project: task.project.clone(),
            context: task.context.clone(),
            due: task.due,
            defer: task.defer,
            flagged: task.flagged,
            priority: task.priority,
            effort_minutes: task.effort_minutes,
            tags: task.tags.clone(),
            positions: task.positions.clone(),
            attachments: task.attachments.clone(),
            parent_id: task.parent_id,
            children: task.children.clone(),
            completed_at: task.completed_at,
            created: task.created,
            modified: task.modified,
        }
    }
}

impl TaskMetadata {
    fn into_task(self, body: String) -> Task {
        Task {
            id: self.id,
            kind: self.kind,
            title: self.title,
            body,
            status: self.status,
            project: self.project,
            context: self.context,
            due: self.due,
            defer: self.defer,
            flagged: self.flagged,
            priority: self.priority,
            effort_minutes: self.effort_minutes,
            positions: self.positions,
            tags: self.tags,
            attachments: self.attachments,
            parent_id: self.parent_id,
            children: self.children,
            completed_at: self.completed_at,
            created: self.created,
            modified: self.modified,
        }
    }
}

impl Record for Task {
    const CATEGORY: Category = Category::Tasks;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn display_name(&self) -> &str {
        &self.title
    }

    fn relative_path(&self, slug_max_len: usize) -> PathBuf {
        paths::task_path(self, slug_max_len)
    }

    fn to_document(&self) -> StoreResult<String> {
        frontmatter::generate(&TaskMetadata::from(self), &self.body).map_err(|e| {
            StoreError::Serialize {
                id: self.key(),
                message: e.to_string(),
            }
        })
    }

    fn from_document(text: &str) -> Result<Self, FrontmatterError> {
        let (metadata, body) = frontmatter::parse_strict::<TaskMetadata>(text)?;
        if metadata.title.trim().is_empty() {
            return Err(FrontmatterError::MalformedMetadata(
                EMPTY_TITLE.to_string(),
            ));
        }
        Ok(metadata.into_task(body))
    }

    fn validate(&self) -> StoreResult<()> {
        if self.title.trim().is_empty() {
            return Err(StoreError::InvalidRecord {
                id: self.key(),
                message: EMPTY_TITLE.to_string(),
            });
        }
        Ok(())
    }

    fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    fn activity(previous: Option<&Self>, current: &Self) -> Vec<ActivityKind> {
        activity::task_activity(previous, current)
    }
}

impl RecordStore<Task> {
    /// Look a task up by its uuid.
    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.get(&id.to_string())
    }

    pub fn by_status(&self, status: Status) -> Vec<Task> {
        self.filter(|t| t.status == status)
    }

    pub fn by_project(&self, project: &str) -> Vec<Task> {
        self.filter(|t| t.project.as_deref() == Some(project))
    }

    pub fn by_context(&self, context: &str) -> Vec<Task> {
        self.filter(|t| t.context.as_deref() == Some(context))
    }

    pub fn matching(&self, filter: &Filter) -> Vec<Task> {
        self.filter(|t| filter.matches(t))
    }

    pub fn matching_rules(&self, rules: &RuleSet, now: DateTime<Utc>) -> Vec<Task> {
        self.filter(|t| rules.matches(t, now))
    }

    pub fn search(&self, query: &str) -> Vec<Task> {
        self.filter(|t| search::matches(t, query))
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.filter(|t| t.is_overdue(now))
    }

    pub fn due_today(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.filter(|t| !t.is_terminal() && t.is_due_today(now))
    }

    pub fn flagged(&self) -> Vec<Task> {
        self.filter(|t| t.flagged && !t.is_terminal())
    }

    /// Open, undeferred tasks (notes excluded).
    pub fn actionable(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.filter(|t| t.is_actionable(now))
    }

    pub fn sorted(&self, key: SortKey, direction: SortDirection) -> Vec<Task> {
        let mut tasks = self.all();
        sort_tasks(&mut tasks, key, direction);
        tasks
    }

    /// Mark a task completed. Returns the updated task.
    pub async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Task> {
        let mut task = self
            .task(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        task.complete(now);
        self.update(task.clone()).await;
        Ok(task)
    }

    /// Reopen a completed task into `status`.
    pub async fn reopen(&self, id: Uuid, status: Status, now: DateTime<Utc>) -> StoreResult<Task> {
        let mut task = self
            .task(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        task.reopen(status, now);
        self.update(task.clone()).await;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn document_lists_required_fields_in_order() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let task = Task::new_at("Buy milk", created).with_body("2 litres\n");
        let doc = task.to_document().unwrap();

        let keys: Vec<&str> = doc
            .lines()
            .skip(1)
            .take_while(|l| *l != "---")
            .filter_map(|l| l.split(':').next())
            .collect();
        assert_eq!(
            keys,
            vec!["id", "kind", "title", "status", "flagged", "priority", "created", "modified"]
        );
        assert!(doc.ends_with("---\n\n2 litres\n"));
    }

    #[test]
    fn full_task_survives_document_roundtrip() {
        let mut task = Task::new("Plan trip")
            .with_project("Travel")
            .with_context("@computer")
            .with_priority(Priority::High)
            .with_body("---\nnot metadata\n")
            .flagged();
        task.tags.insert("summer".to_string());
        task.effort_minutes = Some(45);
        task.positions
            .insert("canvas".to_string(), Position { x: 10.5, y: -3.0 });
        task.attachments.push(Attachment {
            name: "itinerary".to_string(),
            uri: "file:///tmp/itinerary.pdf".to_string(),
        });
        task.children.push(Uuid::new_v4());

        let parsed = Task::from_document(&task.to_document().unwrap()).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn missing_required_field_fails() {
        let text = "---\nid: 7d2c3c4e-8a55-4a7c-9d6b-1f7f1c1d2e3f\ntitle: x\n---\n\n";
        assert!(matches!(
            Task::from_document(text),
            Err(FrontmatterError::MalformedMetadata(_))
        ));
    }

    #[test]
    fn kebab_case_status_on_disk() {
        let task = Task::new("Next").with_status(Status::NextAction);
        assert!(task.to_document().unwrap().contains("status: next-action\n"));
    }

    #[test]
    fn blank_title_is_rejected_before_write() {
        let err = Task::new("  \t ").validate().unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidRecord);
        assert!(Task::new("Call dentist").validate().is_ok());
    }
}
