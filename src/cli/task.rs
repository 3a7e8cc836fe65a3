//! Task subcommand arguments.

use crate::query::{Filter, GroupBy, SortDirection, SortKey};
use crate::types::{Priority, Status, Task, TaskKind};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use clap::Args;

/// Arguments for `gtd add`
#[derive(Args, Debug)]
pub struct AddArgs {
    pub title: String,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub context: Option<String>,

    /// inbox, next-action, waiting, someday
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,

    /// low, medium, high
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub flag: bool,

    /// Due date: YYYY-MM-DD (local midnight) or RFC 3339
    #[arg(long, value_parser = parse_instant)]
    pub due: Option<DateTime<Utc>>,

    /// Hide until: YYYY-MM-DD (local midnight) or RFC 3339
    #[arg(long, value_parser = parse_instant)]
    pub defer: Option<DateTime<Utc>>,

    /// Effort estimate in minutes
    #[arg(long)]
    pub effort: Option<u32>,

    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Store as a reference note rather than an actionable task
    #[arg(long)]
    pub note: bool,

    #[arg(long, default_value = "")]
    pub body: String,
}

impl AddArgs {
    pub fn into_task(self, now: DateTime<Utc>) -> Task {
        let mut task = Task::new_at(self.title, now).with_body(self.body);
        task.status = self.status.unwrap_or_default();
        task.priority = self.priority.unwrap_or_default();
        task.project = self.project;
        task.context = self.context;
        task.flagged = self.flag;
        task.due = self.due;
        task.defer = self.defer;
        task.effort_minutes = self.effort;
        task.tags = self.tags.into_iter().collect();
        if self.note {
            task.kind = TaskKind::Note;
        }
        task
    }
}

/// Arguments for `gtd list`
#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub context: Option<String>,

    #[arg(long)]
    pub flagged: bool,

    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    /// Only open, undeferred tasks
    #[arg(long, conflicts_with = "all")]
    pub actionable: bool,

    /// Include completed tasks
    #[arg(long)]
    pub all: bool,

    /// title, priority, created, modified, status, due
    #[arg(long, default_value = "title", value_parser = parse_sort_key)]
    pub sort: SortKey,

    #[arg(long)]
    pub desc: bool,

    /// none, status, project, context, priority, flagged
    #[arg(long, value_parser = parse_group_by)]
    pub group_by: Option<GroupBy>,
}

impl ListArgs {
    pub fn filter(&self) -> Filter {
        Filter {
            status: self.status,
            project: self.project.clone(),
            context: self.context.clone(),
            flagged: self.flagged.then_some(true),
            priority: self.priority,
            ..Filter::default()
        }
    }

    pub fn direction(&self) -> SortDirection {
        if self.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

/// Arguments for `gtd reopen`
#[derive(Args, Debug)]
pub struct ReopenArgs {
    /// Task id or unique id prefix
    pub id: String,

    /// Status to reopen into
    #[arg(long, default_value = "next-action", value_parser = parse_status)]
    pub status: Status,
}

fn parse_status(s: &str) -> Result<Status, String> {
    Status::parse(s).ok_or_else(|| format!("unknown status '{}'", s))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::parse(s).ok_or_else(|| format!("unknown priority '{}'", s))
}

fn parse_sort_key(s: &str) -> Result<SortKey, String> {
    SortKey::parse(s).ok_or_else(|| format!("unknown sort key '{}'", s))
}

fn parse_group_by(s: &str) -> Result<GroupBy, String> {
    match s.to_lowercase().as_str() {
        "none" => Ok(GroupBy::None),
        "status" => Ok(GroupBy::Status),
        "project" => Ok(GroupBy::Project),
        "context" => Ok(GroupBy::Context),
        "priority" => Ok(GroupBy::Priority),
        "flagged" => Ok(GroupBy::Flagged),
        _ => Err(format!("unknown grouping '{}'", s)),
    }
}

/// RFC 3339, or a bare date taken as local midnight.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM-DD or RFC 3339, got '{}'", s))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid date '{}'", s))?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("'{}' does not exist in the local timezone", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_accepts_rfc3339_and_dates() {
        let exact = parse_instant("2026-03-01T12:30:00Z").unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());

        let day = parse_instant("2026-03-01").unwrap();
        assert_eq!(
            day.with_timezone(&Local).date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn add_args_build_task() {
        let args = AddArgs {
            title: "Call plumber".to_string(),
            project: Some("House".to_string()),
            context: Some("@phone".to_string()),
            status: Some(Status::NextAction),
            priority: None,
            flag: true,
            due: None,
            defer: None,
            effort: Some(10),
            tags: vec!["urgent".to_string()],
            note: false,
            body: String::new(),
        };
        let task = args.into_task(Utc::now());
        assert_eq!(task.status, Status::NextAction);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.flagged);
        assert!(task.tags.contains("urgent"));
    }

    #[test]
    fn list_filter_leaves_unset_fields_open() {
        let args = ListArgs {
            status: None,
            project: Some("House".to_string()),
            context: None,
            flagged: false,
            priority: None,
            actionable: false,
            all: false,
            sort: SortKey::Title,
            desc: true,
            group_by: None,
        };
        let filter = args.filter();
        assert_eq!(filter.project.as_deref(), Some("House"));
        assert!(filter.flagged.is_none());
        assert_eq!(args.direction(), SortDirection::Descending);
    }
}
