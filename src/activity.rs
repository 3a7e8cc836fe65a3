//! Activity notifications for an external audit trail.
//!
//! Record stores report task lifecycle changes through [`ActivitySink`]
//! fire-and-forget; the sink decides what to do with them. The store never
//! waits on or inspects the result.

use crate::types::{Priority, Status, Task};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

/// What changed on a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    StatusChanged { from: Status, to: Status },
    PriorityChanged { from: Priority, to: Priority },
    ProjectChanged { from: Option<String>, to: Option<String> },
    FlagChanged { flagged: bool },
    TagsChanged { added: Vec<String>, removed: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEvent {
    pub record_id: String,
    pub title: String,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

/// Receiver of activity events. Implementations must not block.
pub trait ActivitySink: Send + Sync {
    fn record(&self, event: ActivityEvent);
}

/// Diff two versions of a task into activity kinds. `previous == None`
/// means the task was just created.
pub fn task_activity(previous: Option<&Task>, current: &Task) -> Vec<ActivityKind> {
    let Some(previous) = previous else {
        return vec![ActivityKind::Created];
    };

    let mut kinds = Vec::new();
    if previous.status != current.status {
        kinds.push(ActivityKind::StatusChanged {
            from: previous.status,
            to: current.status,
        });
    }
    if previous.priority != current.priority {
        kinds.push(ActivityKind::PriorityChanged {
            from: previous.priority,
            to: current.priority,
        });
    }
    if previous.project != current.project {
        kinds.push(ActivityKind::ProjectChanged {
            from: previous.project.clone(),
            to: current.project.clone(),
        });
    }
    if previous.flagged != current.flagged {
        kinds.push(ActivityKind::FlagChanged {
            flagged: current.flagged,
        });
    }
    if previous.tags != current.tags {
        let added = current.tags.difference(&previous.tags).cloned().collect();
        let removed = previous.tags.difference(&current.tags).cloned().collect();
        kinds.push(ActivityKind::TagsChanged { added, removed });
    }
    kinds
}

/// Writes activity to the tracing log.
#[derive(Debug, Default, Clone)]
pub struct TracingActivity;

impl ActivitySink for TracingActivity {
    fn record(&self, event: ActivityEvent) {
        info!(
            record = %event.record_id,
            title = %event.title,
            activity = ?event.kind,
            "activity"
        );
    }
}

/// Forwards activity over an unbounded channel to whoever builds the log.
#[derive(Debug, Clone)]
pub struct ChannelActivity {
    tx: mpsc::UnboundedSender<ActivityEvent>,
}

impl ChannelActivity {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ActivityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ActivitySink for ChannelActivity {
    fn record(&self, event: ActivityEvent) {
        // A closed receiver just means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}
