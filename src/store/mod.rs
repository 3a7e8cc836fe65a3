//! Record stores: the authoritative in-memory collections, kept in sync
//! with their files through debounced persistence.
//!
//! One [`RecordStore`] exists per record category and root. It is the only
//! writer of that category's files. Mutations take a single writer gate,
//! update the in-memory snapshot and derived indices, notify subscribers,
//! then arm a per-record debounce timer. Only the newest timer for a record
//! persists; older ones wake up, see a newer generation, and exit.
//!
//! Each record also owns a persistence slot remembering where its file is
//! on disk. Holding the slot serializes writes, moves and deletes of that
//! one record while letting different records persist concurrently.

mod boards;
mod changes;
pub mod files;
mod perspectives;
mod tasks;

pub use boards::{DEFAULT_AUTO_HIDE_DAYS, builtin_boards, plan_auto_boards};
pub use changes::{ChangeKind, ChangeReceiver, StoreChange};
pub use files::{CheckIssue, FileStore, FileStoreStats};

use crate::activity::{ActivityEvent, ActivityKind, ActivitySink};
use crate::error::{FrontmatterError, StoreError, StoreResult};
use crate::paths::Category;
use crate::perspective::Perspective;
use crate::types::{Board, Task};
use changes::ChangeSender;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default debounce interval between the last mutation and the write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

pub type TaskStore = RecordStore<Task>;
pub type BoardStore = RecordStore<Board>;
pub type PerspectiveStore = RecordStore<Perspective>;

/// A record category the store can persist.
pub trait Record: Clone + Send + Sync + 'static {
    const CATEGORY: Category;

    /// Stable identifier, unique within the category.
    fn key(&self) -> String;

    /// Human-facing name used in logs and activity events.
    fn display_name(&self) -> &str;

    /// Path relative to the store root.
    fn relative_path(&self, slug_max_len: usize) -> PathBuf;

    fn to_document(&self) -> StoreResult<String>;

    fn from_document(text: &str) -> Result<Self, FrontmatterError>;

    /// Reject records that `from_document` would refuse to read back.
    fn validate(&self) -> StoreResult<()> {
        Ok(())
    }

    fn project(&self) -> Option<&str> {
        None
    }

    fn context(&self) -> Option<&str> {
        None
    }

    /// Protected records refuse deletion.
    fn is_protected(&self) -> bool {
        false
    }

    fn activity(_previous: Option<&Self>, _current: &Self) -> Vec<ActivityKind> {
        Vec::new()
    }
}

#[derive(Clone)]
pub struct StoreOptions {
    pub debounce: Duration,
    pub activity: Option<Arc<dyn ActivitySink>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            activity: None,
        }
    }
}

impl StoreOptions {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_activity(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.activity = Some(sink);
        self
    }
}

struct State<R> {
    records: BTreeMap<String, R>,
    projects: BTreeSet<String>,
    contexts: BTreeSet<String>,
}

impl<R: Record> State<R> {
    fn new(records: BTreeMap<String, R>) -> Self {
        let mut state = Self {
            records,
            projects: BTreeSet::new(),
            contexts: BTreeSet::new(),
        };
        state.reindex();
        state
    }

    /// Full rescan of the derived indices.
    fn reindex(&mut self) {
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        self.projects = self.records.values().filter_map(|r| non_empty(r.project())).collect();
        self.contexts = self.records.values().filter_map(|r| non_empty(r.context())).collect();
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<PathBuf>>>;

struct Inner<R: Record> {
    files: FileStore,
    debounce: Duration,
    activity: Option<Arc<dyn ActivitySink>>,
    writer: tokio::sync::Mutex<()>,
    state: RwLock<State<R>>,
    /// Record id to the generation of its newest armed timer.
    pending: Mutex<HashMap<String, u64>>,
    generation: AtomicU64,
    slots: Mutex<HashMap<String, Slot>>,
    changes: ChangeSender,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl<R: Record> Inner<R> {
    fn slot(&self, id: &str) -> Slot {
        lock(&self.slots).entry(id.to_string()).or_default().clone()
    }

    fn record(&self, id: &str) -> Option<R> {
        read(&self.state).records.get(id).cloned()
    }

    fn report(&self, previous: Option<&R>, current: &R) {
        let Some(sink) = &self.activity else {
            return;
        };
        let at = Utc::now();
        for kind in R::activity(previous, current) {
            sink.record(ActivityEvent {
                record_id: current.key(),
                title: current.display_name().to_string(),
                at,
                kind,
            });
        }
    }

    /// Arm one timer covering `ids`, superseding their older timers.
    fn schedule(self: &Arc<Self>, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut pending = lock(&self.pending);
            for id in &ids {
                pending.insert(id.clone(), generation);
            }
        }

        let weak = Arc::downgrade(self);
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            for id in ids {
                inner.persist_generation(&id, generation).await;
            }
        });
    }

    /// Remove `id` from the pending set if `generation` still owns it.
    fn claim(&self, id: &str, generation: u64) -> bool {
        let mut pending = lock(&self.pending);
        match pending.get(id) {
            Some(current) if *current == generation => {
                pending.remove(id);
                true
            }
            _ => false,
        }
    }

    async fn persist_generation(&self, id: &str, generation: u64) {
        let slot = self.slot(id);
        let mut location = slot.lock().await;
        if !self.claim(id, generation) {
            return;
        }
        if let Err(e) = self.persist_locked(id, &mut location).await {
            warn!(id, error = %e, "background write failed; will retry on next save or flush");
            lock(&self.pending).entry(id.to_string()).or_insert(generation);
        }
    }

    /// Write the current version of `id`. Caller holds its slot.
    async fn persist_locked(&self, id: &str, location: &mut Option<PathBuf>) -> StoreResult<()> {
        let Some(record) = self.record(id) else {
            return Ok(());
        };
        let files = self.files.clone();
        let previous = location.clone();
        let path = tokio::task::spawn_blocking(move || files.save(&record, previous.as_deref()))
            .await
            .map_err(|e| StoreError::Io {
                path: self.files.root().to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })??;
        *location = Some(path);
        Ok(())
    }

    /// Delete the file of an already-forgotten record.
    async fn remove_file(&self, id: &str, record: R) -> StoreResult<()> {
        let slot = lock(&self.slots).remove(id).unwrap_or_default();
        let mut location = slot.lock().await;
        let path = location.take().unwrap_or_else(|| self.files.path_of(&record));
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || files.delete_path(&path))
            .await
            .map_err(|e| StoreError::Io {
                path: self.files.root().to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })?
    }

    /// Write every pending record and wait for in-flight writes.
    async fn flush_pending(&self) -> StoreResult<()> {
        let due: Vec<(String, u64)> = lock(&self.pending).drain().collect();
        let in_flight: Vec<Slot> = lock(&self.slots).values().cloned().collect();

        let mut first_error = None;
        for (id, generation) in due {
            // Records never written yet have no slot until this call.
            let slot = self.slot(&id);
            let mut location = slot.lock().await;
            if let Err(e) = self.persist_locked(&id, &mut location).await {
                warn!(id = %id, error = %e, "flush failed for record");
                lock(&self.pending).entry(id).or_insert(generation);
                first_error.get_or_insert(e);
            }
        }
        // Taking each slot waits out timer writes already in flight.
        for slot in in_flight {
            drop(slot.lock().await);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn load(files: &FileStore) -> StoreResult<(BTreeMap<String, R>, HashMap<String, Slot>)> {
        let mut records = BTreeMap::new();
        let mut slots = HashMap::new();
        for (record, path) in files.load_all::<R>()? {
            let key = record.key();
            if records.contains_key(&key) {
                warn!(id = %key, path = %path.display(), "duplicate record id on disk; keeping first");
                continue;
            }
            slots.insert(key.clone(), Arc::new(tokio::sync::Mutex::new(Some(path))));
            records.insert(key, record);
        }
        Ok((records, slots))
    }
}

impl<R: Record> Drop for Inner<R> {
    fn drop(&mut self) {
        let pending: Vec<String> = lock(&self.pending).drain().map(|(id, _)| id).collect();
        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), "flushing pending records on drop");
        let state = read(&self.state);
        let slots = lock(&self.slots);
        for id in pending {
            let Some(record) = state.records.get(&id) else {
                continue;
            };
            let previous = slots
                .get(&id)
                .and_then(|slot| slot.try_lock().ok().and_then(|location| location.clone()));
            if let Err(e) = self.files.save(record, previous.as_deref()) {
                warn!(id = %id, error = %e, "failed to persist record on drop");
            }
        }
    }
}

/// Authoritative in-memory collection of one record category.
///
/// Cloning yields another handle to the same store. Pending writes are
/// flushed synchronously when the last handle drops.
pub struct RecordStore<R: Record> {
    inner: Arc<Inner<R>>,
}

impl<R: Record> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Record> RecordStore<R> {
    /// Load the category from disk and build the indices.
    pub async fn open(files: FileStore, options: StoreOptions) -> StoreResult<Self> {
        let loader = files.clone();
        let (records, slots) = tokio::task::spawn_blocking(move || {
            loader.ensure_directory_structure()?;
            Inner::<R>::load(&loader)
        })
        .await
        .map_err(|e| StoreError::Io {
            path: files.root().to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        })??;

        info!(
            category = R::CATEGORY.dir_name(),
            count = records.len(),
            root = %files.root().display(),
            "loaded records"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                files,
                debounce: options.debounce,
                activity: options.activity,
                writer: tokio::sync::Mutex::new(()),
                state: RwLock::new(State::new(records)),
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                slots: Mutex::new(slots),
                changes: ChangeSender::new(),
            }),
        })
    }

    /// Insert a new record. Returns `false`, changing nothing, when the id
    /// already exists or the record fails validation.
    pub async fn add(&self, record: R) -> bool {
        self.add_many(vec![record]).await == 1
    }

    /// Replace an existing record. Returns `false` for an unknown id or an
    /// invalid record.
    pub async fn update(&self, record: R) -> bool {
        self.update_many(vec![record]).await == 1
    }

    /// Insert several records under one debounce timer. Existing ids are
    /// skipped. Returns how many were inserted.
    pub async fn add_many(&self, records: Vec<R>) -> usize {
        let _gate = self.inner.writer.lock().await;
        let mut added = Vec::new();
        {
            let mut state = write(&self.inner.state);
            for record in records {
                let key = record.key();
                if let Err(e) = record.validate() {
                    warn!(id = %key, error = %e, "add rejected");
                    continue;
                }
                if state.records.contains_key(&key) {
                    debug!(id = %key, "add ignored; id exists");
                    continue;
                }
                state.records.insert(key.clone(), record.clone());
                added.push(record);
            }
            if !added.is_empty() {
                state.reindex();
            }
        }
        let ids: Vec<String> = added.iter().map(Record::key).collect();
        for record in &added {
            self.inner.report(None, record);
        }
        self.finish(ChangeKind::Added, ids)
    }

    /// Replace several records under one debounce timer. Unknown ids are
    /// skipped. Returns how many were replaced.
    pub async fn update_many(&self, records: Vec<R>) -> usize {
        let _gate = self.inner.writer.lock().await;
        let mut replaced = Vec::new();
        {
            let mut state = write(&self.inner.state);
            for record in records {
                let key = record.key();
                if let Err(e) = record.validate() {
                    warn!(id = %key, error = %e, "update rejected");
                    continue;
                }
                match state.records.get_mut(&key) {
                    Some(existing) => {
                        let previous = std::mem::replace(existing, record.clone());
                        replaced.push((previous, record));
                    }
                    None => debug!(id = %key, "update ignored; unknown id"),
                }
            }
            if !replaced.is_empty() {
                state.reindex();
            }
        }
        let ids: Vec<String> = replaced.iter().map(|(_, r)| r.key()).collect();
        for (previous, current) in &replaced {
            self.inner.report(Some(previous), current);
        }
        self.finish(ChangeKind::Updated, ids)
    }

    fn finish(&self, kind: ChangeKind, ids: Vec<String>) -> usize {
        let count = ids.len();
        if count > 0 {
            self.inner.changes.publish(kind, ids.clone());
            self.inner.schedule(ids);
        }
        count
    }

    /// Remove a record and its file immediately. Returns `false` for an
    /// unknown id.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.delete_many(&[id]).await? == 1)
    }

    /// Remove several records in one pass. Protected ids fail the whole
    /// call before anything is removed.
    pub async fn delete_many(&self, ids: &[&str]) -> StoreResult<usize> {
        let _gate = self.inner.writer.lock().await;
        let removed: Vec<(String, R)> = {
            let mut state = write(&self.inner.state);
            if let Some(protected) = ids
                .iter()
                .filter_map(|id| state.records.get(*id))
                .find(|r| r.is_protected())
            {
                return Err(StoreError::Protected(protected.key()));
            }
            let mut seen = HashSet::new();
            let removed: Vec<(String, R)> = ids
                .iter()
                .filter(|id| seen.insert(**id))
                .filter_map(|id| state.records.remove(*id).map(|r| (id.to_string(), r)))
                .collect();
            if !removed.is_empty() {
                state.reindex();
            }
            removed
        };
        if removed.is_empty() {
            return Ok(0);
        }

        {
            let mut pending = lock(&self.inner.pending);
            for (id, _) in &removed {
                pending.remove(id);
            }
        }
        let ids: Vec<String> = removed.iter().map(|(id, _)| id.clone()).collect();
        self.inner.changes.publish(ChangeKind::Deleted, ids);

        let count = removed.len();
        let mut first_error = None;
        for (id, record) in removed {
            if let Err(e) = self.inner.remove_file(&id, record).await {
                warn!(id = %id, error = %e, "failed to delete record file");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    /// Upsert and write now, superseding any pending timer for the record.
    pub async fn save_immediately(&self, record: R) -> StoreResult<()> {
        record.validate()?;
        let _gate = self.inner.writer.lock().await;
        let key = record.key();
        let previous = {
            let mut state = write(&self.inner.state);
            let previous = state.records.insert(key.clone(), record.clone());
            state.reindex();
            previous
        };
        lock(&self.inner.pending).remove(&key);
        self.inner.report(previous.as_ref(), &record);
        let kind = if previous.is_some() {
            ChangeKind::Updated
        } else {
            ChangeKind::Added
        };
        self.inner.changes.publish(kind, vec![key.clone()]);

        let slot = self.inner.slot(&key);
        let mut location = slot.lock().await;
        self.inner.persist_locked(&key, &mut location).await
    }

    /// Write every pending record now and wait for in-flight writes.
    pub async fn flush(&self) -> StoreResult<()> {
        let _gate = self.inner.writer.lock().await;
        self.inner.flush_pending().await
    }

    /// Flush, then replace the in-memory collection from disk.
    pub async fn reload(&self) -> StoreResult<()> {
        let _gate = self.inner.writer.lock().await;
        self.inner.flush_pending().await?;

        let files = self.inner.files.clone();
        let (records, slots) = tokio::task::spawn_blocking(move || Inner::<R>::load(&files))
            .await
            .map_err(|e| StoreError::Io {
                path: self.inner.files.root().to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })??;

        let count = records.len();
        *write(&self.inner.state) = State::new(records);
        *lock(&self.inner.slots) = slots;
        self.inner.changes.publish(ChangeKind::Reloaded, Vec::new());
        info!(category = R::CATEGORY.dir_name(), count, "reloaded records");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.inner.record(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        read(&self.inner.state).records.contains_key(id)
    }

    /// Snapshot of every record, ordered by id.
    pub fn all(&self) -> Vec<R> {
        read(&self.inner.state).records.values().cloned().collect()
    }

    /// Records satisfying `predicate`, ordered by id.
    pub fn filter(&self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        read(&self.inner.state)
            .records
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.inner.state).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct non-empty project names, sorted.
    pub fn projects(&self) -> Vec<String> {
        read(&self.inner.state).projects.iter().cloned().collect()
    }

    /// Distinct non-empty contexts, sorted.
    pub fn contexts(&self) -> Vec<String> {
        read(&self.inner.state).contexts.iter().cloned().collect()
    }

    /// Records with a write still waiting on its timer.
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    pub fn subscribe(&self) -> ChangeReceiver {
        self.inner.changes.subscribe()
    }

    /// Number of mutations published so far.
    pub fn version(&self) -> u64 {
        self.inner.changes.version()
    }

    pub fn files(&self) -> &FileStore {
        &self.inner.files
    }

    pub fn stats(&self) -> FileStoreStats {
        self.inner.files.stats()
    }

    /// Where a record's file currently is, if it has been written.
    pub async fn location(&self, id: &str) -> Option<PathBuf> {
        let slot = lock(&self.inner.slots).get(id).cloned()?;
        let location = slot.lock().await;
        location.clone()
    }
}
