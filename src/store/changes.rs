//! Change notifications for record stores.
//!
//! Every mutation bumps a version and publishes a [`StoreChange`] through a
//! tokio watch channel after the in-memory snapshot and derived indices are
//! updated. Watch semantics mean a slow subscriber only sees the latest
//! change; the version lets it detect that it skipped some.

use tokio::sync::watch;

/// Categories of mutation reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
    /// The collection was replaced wholesale from disk.
    Reloaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// Monotonic per store, starting at 1 for the first mutation.
    pub version: u64,
    pub kind: ChangeKind,
    pub ids: Vec<String>,
}

impl StoreChange {
    pub fn touches(&self, id: &str) -> bool {
        self.kind == ChangeKind::Reloaded || self.ids.iter().any(|i| i == id)
    }
}

/// Sending half, owned by the store.
#[derive(Debug)]
pub(crate) struct ChangeSender {
    tx: watch::Sender<Option<StoreChange>>,
}

impl ChangeSender {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub(crate) fn publish(&self, kind: ChangeKind, ids: Vec<String>) {
        self.tx.send_modify(|slot| {
            let version = slot.as_ref().map_or(1, |c| c.version + 1);
            *slot = Some(StoreChange { version, kind, ids });
        });
    }

    pub(crate) fn version(&self) -> u64 {
        self.tx.borrow().as_ref().map_or(0, |c| c.version)
    }

    pub(crate) fn subscribe(&self) -> ChangeReceiver {
        ChangeReceiver {
            events: self.tx.subscribe(),
        }
    }
}

/// Receiving half handed to subscribers.
#[derive(Debug, Clone)]
pub struct ChangeReceiver {
    pub events: watch::Receiver<Option<StoreChange>>,
}

impl ChangeReceiver {
    /// Wait for the next change. `None` once the store is gone.
    pub async fn wait_for_change(&mut self) -> Option<StoreChange> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let change = self.events.borrow_and_update().clone();
            if change.is_some() {
                return change;
            }
        }
    }

    pub fn has_pending_change(&self) -> bool {
        self.events.has_changed().unwrap_or(false)
    }

    pub fn latest(&self) -> Option<StoreChange> {
        self.events.borrow().clone()
    }
}
