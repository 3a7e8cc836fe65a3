//! Composable rule-sets used by saved perspectives.
//!
//! A rule is a `(property, operator, value)` triple. Each property exposes a
//! typed value; every combination of property type, operator and rule value
//! is matched exhaustively and anything that does not line up evaluates to
//! `false` instead of erroring.

use crate::types::Task;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Task property a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Property {
    Title,
    Body,
    Project,
    Context,
    Tags,
    Status,
    Priority,
    Kind,
    Flagged,
    Effort,
    Due,
    Defer,
    Created,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    NotContains,
    LessThan,
    GreaterThan,
    IsTrue,
    IsFalse,
    IsWithinRange,
}

/// Relative or absolute date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "range", rename_all = "kebab-case")]
pub enum DateRange {
    Today,
    Tomorrow,
    ThisWeek,
    /// Today through `n` days ahead (local calendar days).
    NextDays { days: u32 },
    /// Strictly before now.
    Overdue,
    Between {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<DateTime<Utc>>,
    },
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let day = local_day(instant);
        let today = local_day(now);
        match *self {
            DateRange::Today => day == today,
            DateRange::Tomorrow => today.succ_opt() == Some(day),
            DateRange::ThisWeek => day.iso_week() == today.iso_week(),
            DateRange::NextDays { days } => {
                day >= today && day <= today + Duration::days(i64::from(days))
            }
            DateRange::Overdue => instant < now,
            DateRange::Between { start, end } => {
                start.is_none_or(|s| instant >= s) && end.is_none_or(|e| instant <= e)
            }
        }
    }
}

fn local_day(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

/// Tagged rule operand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum RuleValue {
    #[default]
    None,
    Text(String),
    Number(f64),
    Boolean(bool),
    DateRange(DateRange),
}

/// Typed view of a task property.
enum PropertyValue<'a> {
    Text(Option<&'a str>),
    TextList(Vec<&'a str>),
    Number(Option<f64>),
    Boolean(bool),
    Date(Option<DateTime<Utc>>),
}

impl Property {
    fn value_of<'a>(&self, task: &'a Task) -> PropertyValue<'a> {
        match self {
            Property::Title => PropertyValue::Text(Some(&task.title)),
            Property::Body => PropertyValue::Text(Some(&task.body)),
            Property::Project => PropertyValue::Text(task.project.as_deref()),
            Property::Context => PropertyValue::Text(task.context.as_deref()),
            Property::Tags => PropertyValue::TextList(task.tags.iter().map(String::as_str).collect()),
            Property::Status => PropertyValue::Text(Some(task.status.as_str())),
            Property::Priority => PropertyValue::Text(Some(task.priority.as_str())),
            Property::Kind => PropertyValue::Text(Some(task.kind.as_str())),
            Property::Flagged => PropertyValue::Boolean(task.flagged),
            Property::Effort => PropertyValue::Number(task.effort_minutes.map(f64::from)),
            Property::Due => PropertyValue::Date(task.due),
            Property::Defer => PropertyValue::Date(task.defer),
            Property::Created => PropertyValue::Date(Some(task.created)),
            Property::Modified => PropertyValue::Date(Some(task.modified)),
        }
    }
}

fn text_matches(operator: Operator, value: &str, query: &str) -> bool {
    let value = value.to_lowercase();
    let query = query.to_lowercase();
    match operator {
        Operator::Equals => value == query,
        Operator::Contains => value.contains(&query),
        Operator::StartsWith => value.starts_with(&query),
        Operator::EndsWith => value.ends_with(&query),
        Operator::NotContains => !value.contains(&query),
        _ => false,
    }
}

/// A single `(property, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub property: Property,
    pub operator: Operator,
    #[serde(default)]
    pub value: RuleValue,
}

impl Rule {
    pub fn new(property: Property, operator: Operator, value: RuleValue) -> Self {
        Self {
            property,
            operator,
            value,
        }
    }

    pub fn text(property: Property, operator: Operator, text: impl Into<String>) -> Self {
        Self::new(property, operator, RuleValue::Text(text.into()))
    }

    pub fn evaluate(&self, task: &Task, now: DateTime<Utc>) -> bool {
        use PropertyValue as P;
        match (self.property.value_of(task), &self.value) {
            (P::Text(value), RuleValue::Text(query)) => {
                text_matches(self.operator, value.unwrap_or(""), query)
            }
            (P::TextList(values), RuleValue::Text(query)) => match self.operator {
                Operator::NotContains => values
                    .iter()
                    .all(|v| text_matches(Operator::NotContains, v, query)),
                op => values.iter().any(|v| text_matches(op, v, query)),
            },
            (P::Number(Some(value)), RuleValue::Number(target)) => match self.operator {
                Operator::Equals => (value - target).abs() < f64::EPSILON,
                Operator::LessThan => value < *target,
                Operator::GreaterThan => value > *target,
                _ => false,
            },
            (P::Boolean(flag), _) => match self.operator {
                Operator::IsTrue => flag,
                Operator::IsFalse => !flag,
                _ => false,
            },
            (P::Date(Some(instant)), RuleValue::DateRange(range)) => {
                self.operator == Operator::IsWithinRange && range.contains(instant, now)
            }
            (P::Text(_), _)
            | (P::TextList(_), _)
            | (P::Number(_), _)
            | (P::Date(_), _) => false,
        }
    }
}

/// How rule results combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// Rules combined with a single logic mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub logic: Logic,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, logic: Logic) -> Self {
        Self { rules, logic }
    }

    /// An empty rule-set matches everything.
    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        match self.logic {
            Logic::And => self.rules.iter().all(|r| r.evaluate(task, now)),
            Logic::Or => self.rules.iter().any(|r| r.evaluate(task, now)),
        }
    }
}
