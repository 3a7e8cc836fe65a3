//! Perspective records persisted at `perspectives/<id>.md`.
//!
//! The description is the file body; everything else lives in the
//! frontmatter.

use super::{Record, RecordStore};
use crate::error::{FrontmatterError, StoreError, StoreResult};
use crate::frontmatter;
use crate::paths::{self, Category};
use crate::perspective::{self, Perspective, builtin_perspectives};
use crate::query::{GroupBy, RuleSet, SortDirection, SortKey, TaskGroup};
use crate::types::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct PerspectiveMetadata {
    id: Uuid,
    name: String,
    #[serde(default)]
    rules: RuleSet,
    #[serde(default)]
    group_by: GroupBy,
    #[serde(default)]
    sort_by: SortKey,
    #[serde(default)]
    sort_direction: SortDirection,
    #[serde(default)]
    show_completed: bool,
    #[serde(default)]
    show_deferred: bool,
    #[serde(default)]
    built_in: bool,
}

impl Record for Perspective {
    const CATEGORY: Category = Category::Perspectives;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn relative_path(&self, _slug_max_len: usize) -> PathBuf {
        paths::perspective_path(&self.key())
    }

    fn to_document(&self) -> StoreResult<String> {
        let metadata = PerspectiveMetadata {
            id: self.id,
            name: self.name.clone(),
            rules: self.rules.clone(),
            group_by: self.group_by,
            sort_by: self.sort_by,
            sort_direction: self.sort_direction,
            show_completed: self.show_completed,
            show_deferred: self.show_deferred,
            built_in: self.built_in,
        };
        frontmatter::generate(&metadata, &self.description).map_err(|e| StoreError::Serialize {
            id: self.key(),
            message: e.to_string(),
        })
    }

    fn from_document(text: &str) -> Result<Self, FrontmatterError> {
        let (m, description) = frontmatter::parse_strict::<PerspectiveMetadata>(text)?;
        Ok(Perspective {
            id: m.id,
            name: m.name,
            description,
            rules: m.rules,
            group_by: m.group_by,
            sort_by: m.sort_by,
            sort_direction: m.sort_direction,
            show_completed: m.show_completed,
            show_deferred: m.show_deferred,
            built_in: m.built_in,
        })
    }

    fn is_protected(&self) -> bool {
        self.built_in
    }
}

impl RecordStore<Perspective> {
    /// Add the built-in perspectives that are missing.
    pub async fn seed_builtins(&self) -> usize {
        let missing: Vec<Perspective> = builtin_perspectives()
            .into_iter()
            .filter(|p| !self.contains(&p.key()))
            .collect();
        self.add_many(missing).await
    }

    pub fn perspective(&self, id: Uuid) -> Option<Perspective> {
        self.get(&id.to_string())
    }

    /// Case-insensitive name lookup; built-ins win ties.
    pub fn by_name(&self, name: &str) -> Option<Perspective> {
        let mut found = self.filter(|p| p.name.eq_ignore_ascii_case(name));
        found.sort_by_key(|p| !p.built_in);
        found.into_iter().next()
    }

    /// Run a stored perspective over `tasks`.
    pub fn apply(&self, id: Uuid, tasks: &[Task], now: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        let perspective = self
            .perspective(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(perspective.apply(tasks, now))
    }

    pub fn apply_grouped(
        &self,
        id: Uuid,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TaskGroup>> {
        let perspective = self
            .perspective(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(perspective.apply_grouped(tasks, now))
    }

    pub fn export(&self, id: Uuid) -> StoreResult<Vec<u8>> {
        let perspective = self
            .perspective(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        perspective::export(&perspective)
    }

    pub fn export_gzip(&self, id: Uuid) -> StoreResult<Vec<u8>> {
        let perspective = self
            .perspective(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        perspective::export_gzip(&perspective)
    }

    /// Decode and add an exported perspective under a fresh id.
    pub async fn import(&self, bytes: &[u8]) -> StoreResult<Perspective> {
        let perspective = perspective::import(bytes)?;
        self.add(perspective.clone()).await;
        Ok(perspective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{DateRange, Logic, Operator, Property, Rule, RuleValue};

    #[test]
    fn perspective_document_roundtrips_rules() {
        let mut perspective = Perspective::new(
            "Errands this week",
            vec![
                Rule::text(Property::Context, Operator::Equals, "@town"),
                Rule::new(
                    Property::Due,
                    Operator::IsWithinRange,
                    RuleValue::DateRange(DateRange::ThisWeek),
                ),
                Rule::new(Property::Effort, Operator::LessThan, RuleValue::Number(30.0)),
            ],
            Logic::Or,
        )
        .grouped_by(GroupBy::Project);
        perspective.description = "Quick trips.\n".to_string();

        let doc = perspective.to_document().unwrap();
        assert!(doc.ends_with("---\n\nQuick trips.\n"));
        assert_eq!(Perspective::from_document(&doc).unwrap(), perspective);
    }

    #[test]
    fn builtin_perspectives_serialize() {
        for perspective in builtin_perspectives() {
            let doc = perspective.to_document().unwrap();
            assert_eq!(Perspective::from_document(&doc).unwrap(), perspective);
        }
    }
}
