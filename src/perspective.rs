//! Perspectives: named, saved queries (rules + sort + group) over tasks.

use crate::error::{StoreError, StoreResult};
use crate::query::{
    GroupBy, Logic, Operator, Property, Rule, RuleSet, RuleValue, SortDirection, SortKey,
    TaskGroup, group_tasks, sort_tasks,
};
use crate::query::rules::DateRange;
use crate::types::Task;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use uuid::Uuid;

/// Export envelope format version (semver).
pub const EXPORT_VERSION: &str = "1.0.0";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A saved query configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub show_completed: bool,
    #[serde(default)]
    pub show_deferred: bool,
    #[serde(default)]
    pub built_in: bool,
}

impl Perspective {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>, logic: Logic) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            rules: RuleSet::new(rules, logic),
            group_by: GroupBy::None,
            sort_by: SortKey::Title,
            sort_direction: SortDirection::Ascending,
            show_completed: false,
            show_deferred: false,
            built_in: false,
        }
    }

    pub fn grouped_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn sorted_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort_by = key;
        self.sort_direction = direction;
        self
    }

    /// Whether a task passes the rules and the visibility flags.
    pub fn includes(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if task.is_terminal() && !self.show_completed {
            return false;
        }
        if task.is_deferred(now) && !self.show_deferred {
            return false;
        }
        self.rules.matches(task, now)
    }

    /// Filter then sort.
    pub fn apply<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>, now: DateTime<Utc>) -> Vec<Task> {
        let mut matched: Vec<Task> = tasks
            .into_iter()
            .filter(|task| self.includes(task, now))
            .cloned()
            .collect();
        sort_tasks(&mut matched, self.sort_by, self.sort_direction);
        matched
    }

    /// Filter, sort, then partition by the group-by key.
    pub fn apply_grouped<'a>(
        &self,
        tasks: impl IntoIterator<Item = &'a Task>,
        now: DateTime<Utc>,
    ) -> Vec<TaskGroup> {
        group_tasks(self.apply(tasks, now), self.group_by)
    }
}

fn builtin(id: u128, name: &str, rules: Vec<Rule>) -> Perspective {
    let mut perspective = Perspective::new(name, rules, Logic::And);
    perspective.id = Uuid::from_u128(id);
    perspective.built_in = true;
    perspective
}

fn status_is(status: &str) -> Rule {
    Rule::text(Property::Status, Operator::Equals, status)
}

/// Perspectives seeded into every store on first load.
pub fn builtin_perspectives() -> Vec<Perspective> {
    vec![
        builtin(0x01, "Inbox", vec![status_is("inbox")])
            .sorted_by(SortKey::Created, SortDirection::Ascending),
        builtin(0x02, "Next Actions", vec![status_is("next-action")])
            .grouped_by(GroupBy::Context)
            .sorted_by(SortKey::Priority, SortDirection::Descending),
        builtin(0x03, "Waiting For", vec![status_is("waiting")])
            .sorted_by(SortKey::Due, SortDirection::Ascending),
        builtin(0x04, "Someday/Maybe", vec![status_is("someday")])
            .grouped_by(GroupBy::Project),
        builtin(
            0x05,
            "Flagged",
            vec![Rule::new(Property::Flagged, Operator::IsTrue, RuleValue::None)],
        )
        .sorted_by(SortKey::Due, SortDirection::Ascending),
        builtin(
            0x06,
            "Due Soon",
            vec![Rule::new(
                Property::Due,
                Operator::IsWithinRange,
                RuleValue::DateRange(DateRange::NextDays { days: 7 }),
            )],
        )
        .sorted_by(SortKey::Due, SortDirection::Ascending),
    ]
}

/// Transferable form of a single perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectiveExport {
    pub export_version: String,
    pub exported_at: String,
    pub exported_by: String,
    pub perspective: Perspective,
}

impl PerspectiveExport {
    pub fn new(perspective: &Perspective) -> Self {
        Self {
            export_version: EXPORT_VERSION.to_string(),
            exported_at: Utc::now().to_rfc3339(),
            exported_by: format!("gtd-store v{}", env!("CARGO_PKG_VERSION")),
            perspective: perspective.clone(),
        }
    }
}

/// Serialize a perspective to pretty JSON bytes.
pub fn export(perspective: &Perspective) -> StoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(&PerspectiveExport::new(perspective)).map_err(|e| {
        StoreError::Serialize {
            id: perspective.id.to_string(),
            message: e.to_string(),
        }
    })
}

/// Serialize a perspective to gzip-compressed JSON bytes.
pub fn export_gzip(perspective: &Perspective) -> StoreResult<Vec<u8>> {
    let json = export(perspective)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let serialize_err = |e: std::io::Error| StoreError::Serialize {
        id: perspective.id.to_string(),
        message: e.to_string(),
    };
    encoder.write_all(&json).map_err(serialize_err)?;
    encoder.finish().map_err(serialize_err)
}

/// Decode exported bytes (plain or gzip). The result always has a fresh id
/// and is never built-in, whatever the payload claims.
pub fn import(bytes: &[u8]) -> StoreResult<Perspective> {
    let decoded;
    let json: &[u8] = if bytes.starts_with(&GZIP_MAGIC) {
        let mut buf = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut buf)
            .map_err(|e| StoreError::InvalidImport(e.to_string()))?;
        decoded = buf;
        &decoded
    } else {
        bytes
    };

    let mut perspective = match serde_json::from_slice::<PerspectiveExport>(json) {
        Ok(envelope) => envelope.perspective,
        Err(envelope_err) => serde_json::from_slice::<Perspective>(json)
            .map_err(|_| StoreError::InvalidImport(envelope_err.to_string()))?,
    };
    perspective.id = Uuid::new_v4();
    perspective.built_in = false;
    Ok(perspective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Status};
    use chrono::Duration;

    #[test]
    fn completed_and_deferred_are_hidden_by_default() {
        let now = Utc::now();
        let mut deferred = Task::new("later");
        deferred.defer = Some(now + Duration::days(1));
        let done = Task::new("done").with_status(Status::Completed);
        let open = Task::new("open");

        let mut perspective = Perspective::new("everything", vec![], Logic::And);
        let titles = |p: &Perspective| -> Vec<String> {
            p.apply([&deferred, &done, &open], now)
                .into_iter()
                .map(|t| t.title)
                .collect()
        };
        assert_eq!(titles(&perspective), vec!["open"]);

        perspective.show_completed = true;
        perspective.show_deferred = true;
        assert_eq!(titles(&perspective), vec!["done", "later", "open"]);
    }

    #[test]
    fn grouped_apply_buckets_sorted_results() {
        let now = Utc::now();
        let tasks = [
            Task::new("b").with_context("@home").with_priority(Priority::Low),
            Task::new("a").with_context("@home").with_priority(Priority::High),
            Task::new("c").with_context("@work"),
        ];
        let perspective = Perspective::new("by context", vec![], Logic::And)
            .grouped_by(GroupBy::Context)
            .sorted_by(SortKey::Priority, SortDirection::Descending);
        let groups = perspective.apply_grouped(tasks.iter(), now);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "@home");
        assert_eq!(groups[0].tasks[0].title, "a");
    }

    #[test]
    fn builtins_have_stable_ids() {
        let first = builtin_perspectives();
        let second = builtin_perspectives();
        assert_eq!(first.len(), 6);
        assert!(first.iter().all(|p| p.built_in));
        let ids: Vec<Uuid> = first.iter().map(|p| p.id).collect();
        assert_eq!(ids, second.iter().map(|p| p.id).collect::<Vec<_>>());
    }

    #[test]
    fn import_assigns_fresh_id_and_clears_builtin() {
        let original = builtin_perspectives().remove(1);
        for bytes in [export(&original).unwrap(), export_gzip(&original).unwrap()] {
            let imported = import(&bytes).unwrap();
            assert_ne!(imported.id, original.id);
            assert!(!imported.built_in);
            assert_eq!(imported.name, original.name);
            assert_eq!(imported.rules, original.rules);
        }
    }

    #[test]
    fn import_rejects_garbage() {
        let err = import(b"not json").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidImport);
    }
}
