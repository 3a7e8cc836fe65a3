//! Watches a store root for edits made outside the record stores.
//!
//! Record files are meant to be human-editable, so a running process needs
//! to learn when someone changes them underneath it. Events are debounced,
//! classified by record category, and published through a tokio watch
//! channel. Temporary files from atomic writes are ignored.

use crate::paths::{self, Category, StoreLayout};
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Classified change under the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFileEvent {
    Task(PathBuf),
    Board(PathBuf),
    Perspective(PathBuf),
    /// Several record files changed in one debounce window.
    Batch(Vec<PathBuf>),
    Error(String),
}

impl StoreFileEvent {
    pub fn requires_reload(&self) -> bool {
        !matches!(self, StoreFileEvent::Error(_))
    }

    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            StoreFileEvent::Task(p) | StoreFileEvent::Board(p) | StoreFileEvent::Perspective(p) => {
                vec![p.as_path()]
            }
            StoreFileEvent::Batch(paths) => paths.iter().map(|p| p.as_path()).collect(),
            StoreFileEvent::Error(_) => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Dropping the handle stops the watcher.
pub struct StoreWatcherHandle {
    pub events: watch::Receiver<Option<StoreFileEvent>>,
    _task_handle: tokio::task::JoinHandle<()>,
}

impl StoreWatcherHandle {
    /// Wait for the next event. `None` once the watcher stopped.
    pub async fn wait_for_change(&mut self) -> Option<StoreFileEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow_and_update().clone();
            if event.is_some() {
                return event;
            }
        }
    }
}

/// Start watching `layout`'s root recursively.
pub fn start_store_watcher(
    layout: StoreLayout,
    config: WatcherConfig,
) -> Result<StoreWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    info!("Watching store root: {}", layout.root().display());
    debouncer
        .watcher()
        .watch(layout.root(), notify::RecursiveMode::Recursive)?;

    let task_handle = tokio::task::spawn_blocking(move || {
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &layout);
    });

    Ok(StoreWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<StoreFileEvent>>,
    layout: &StoreLayout,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if let Some(event) = classify_events(events, layout) {
                    debug!("Store change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Store watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(StoreFileEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("Store watcher channel closed, stopping");
                return;
            }
        }
    }
}

fn classify_events(events: Vec<DebouncedEvent>, layout: &StoreLayout) -> Option<StoreFileEvent> {
    let mut changed: Vec<PathBuf> = events
        .into_iter()
        .filter(|e| {
            matches!(
                e.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .map(|e| e.path)
        .filter(|p| classify_path(p, layout).is_some())
        .collect();
    changed.sort();
    changed.dedup();

    match changed.len() {
        0 => None,
        1 => changed.pop().and_then(|p| classify_path(&p, layout)),
        _ => Some(StoreFileEvent::Batch(changed)),
    }
}

/// Classify one path; `None` for anything that is not a record file.
fn classify_path(path: &Path, layout: &StoreLayout) -> Option<StoreFileEvent> {
    if !paths::is_record_file(path) {
        return None;
    }
    let path = path.to_path_buf();
    match layout.category_of(&path)? {
        Category::Tasks => Some(StoreFileEvent::Task(path)),
        Category::Boards => Some(StoreFileEvent::Board(path)),
        Category::Perspectives => Some(StoreFileEvent::Perspective(path)),
    }
}
