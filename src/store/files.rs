//! File store: atomic read/write/move/delete of record files under a root.
//!
//! All operations here are blocking; the record store runs them on the
//! blocking pool. A record is never visible at two paths at once: a path
//! change renames the old file into place first and only then rewrites it.

use super::Record;
use crate::error::{StoreError, StoreResult};
use crate::paths::{self, DEFAULT_SLUG_MAX_LEN, StoreLayout};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStoreStats {
    pub writes: u64,
    pub moves: u64,
    pub deletes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    writes: AtomicU64,
    moves: AtomicU64,
    deletes: AtomicU64,
}

/// A file that failed the integrity scan.
#[derive(Debug)]
pub struct CheckIssue {
    pub path: PathBuf,
    pub error: StoreError,
}

/// Handle on a store root. Cheap to clone; clones share counters.
#[derive(Debug, Clone)]
pub struct FileStore {
    layout: StoreLayout,
    slug_max_len: usize,
    counters: Arc<Counters>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StoreLayout::new(root),
            slug_max_len: DEFAULT_SLUG_MAX_LEN,
            counters: Arc::default(),
        }
    }

    pub fn with_slug_max_len(mut self, slug_max_len: usize) -> Self {
        self.slug_max_len = slug_max_len.max(1);
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn stats(&self) -> FileStoreStats {
        FileStoreStats {
            writes: self.counters.writes.load(Ordering::Relaxed),
            moves: self.counters.moves.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
        }
    }

    /// Create every expected directory. Idempotent.
    pub fn ensure_directory_structure(&self) -> StoreResult<()> {
        for dir in self.layout.expected_dirs() {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Absolute path where `record` currently belongs.
    pub fn path_of<R: Record>(&self, record: &R) -> PathBuf {
        self.layout
            .absolute(&record.relative_path(self.slug_max_len))
    }

    /// Write `record` at its resolved path.
    pub fn write<R: Record>(&self, record: &R) -> StoreResult<PathBuf> {
        let path = self.path_of(record);
        write_atomic(&path, &record.to_document()?)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        debug!(id = %record.key(), path = %path.display(), "wrote record");
        Ok(path)
    }

    /// Strictly read one record file.
    pub fn read<R: Record>(&self, path: &Path) -> StoreResult<R> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        R::from_document(&text).map_err(|e| StoreError::parse(path, e))
    }

    /// Remove the file at `record`'s resolved path. A missing file is fine.
    pub fn delete<R: Record>(&self, record: &R) -> StoreResult<()> {
        self.delete_path(&self.path_of(record))
    }

    pub fn delete_path(&self, path: &Path) -> StoreResult<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                self.counters.deletes.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), "deleted record file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Relocate `record` from `from` to `to` and rewrite its content there.
    /// Falls back to a plain write when `from` is gone.
    pub fn move_record<R: Record>(&self, record: &R, from: &Path, to: &Path) -> StoreResult<()> {
        let contents = record.to_document()?;
        if from != to && from.exists() {
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            fs::rename(from, to).map_err(|e| StoreError::io(from, e))?;
            self.counters.moves.fetch_add(1, Ordering::Relaxed);
            debug!(
                id = %record.key(),
                from = %from.display(),
                to = %to.display(),
                "moved record"
            );
        }
        write_atomic(to, &contents)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Persist `record`, moving it from `previous` when its path changed.
    pub fn save<R: Record>(&self, record: &R, previous: Option<&Path>) -> StoreResult<PathBuf> {
        let target = self.path_of(record);
        match previous {
            Some(previous) if previous != target => {
                self.move_record(record, previous, &target)?;
                Ok(target)
            }
            _ => self.write(record),
        }
    }

    /// Load every record of `R`'s category, paired with its path.
    /// Unparseable files are skipped with a warning; enumeration and read
    /// failures propagate.
    pub fn load_all<R: Record>(&self) -> StoreResult<Vec<(R, PathBuf)>> {
        let mut loaded = Vec::new();
        for path in self.record_files(R::CATEGORY)? {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                // Removed between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            };
            match R::from_document(&text) {
                Ok(record) => loaded.push((record, path)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable record file"),
            }
        }
        Ok(loaded)
    }

    /// Strict integrity scan: every file that fails to parse, plus every
    /// file whose id was already seen.
    pub fn check<R: Record>(&self) -> StoreResult<Vec<CheckIssue>> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for path in self.record_files(R::CATEGORY)? {
            match self.read::<R>(&path) {
                Ok(record) => {
                    let key = record.key();
                    if !seen.insert(key.clone()) {
                        issues.push(CheckIssue {
                            path,
                            error: StoreError::DuplicateIdentifier(key),
                        });
                    }
                }
                Err(StoreError::NotFound(_)) => continue,
                Err(error) if error.is_parse_failure() => issues.push(CheckIssue { path, error }),
                Err(error) => return Err(error),
            }
        }
        Ok(issues)
    }

    fn record_files(&self, category: paths::Category) -> StoreResult<Vec<PathBuf>> {
        let dir = self.layout.category_dir(category);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                StoreError::io(path, e.into())
            })?;
            if entry.file_type().is_file() && paths::is_record_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

/// Temp file in the target directory, fsync, rename over the target.
fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::NotFound(path.display().to_string()))?;
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".gtd-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Status, Task};
    use chrono::Utc;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let files = FileStore::new(dir.path());
        files.ensure_directory_structure().unwrap();
        (dir, files)
    }

    #[test]
    fn write_then_read_returns_equal_record() {
        let (_dir, files) = store();
        let task = Task::new("Call mom").with_body("about sunday\n");
        let path = files.write(&task).unwrap();
        let read: Task = files.read(&path).unwrap();
        assert_eq!(read, task);
        assert_eq!(files.stats().writes, 1);
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let (dir, files) = store();
        let err = files
            .read::<Task>(&dir.path().join("tasks/active/nope.md"))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::NotFound);
    }

    #[test]
    fn save_moves_file_when_path_changes() {
        let (_dir, files) = store();
        let mut task = Task::new("Ship it");
        let before = files.save(&task, None).unwrap();

        task.complete(Utc::now());
        let after = files.save(&task, Some(&before)).unwrap();

        assert_ne!(before, after);
        assert!(!before.exists());
        assert!(after.exists());
        assert_eq!(files.read::<Task>(&after).unwrap().status, Status::Completed);
        assert_eq!(files.stats().moves, 1);
    }

    #[test]
    fn move_from_missing_source_degrades_to_write() {
        let (dir, files) = store();
        let task = Task::new("Orphan");
        let target = files.path_of(&task);
        files
            .move_record(&task, &dir.path().join("tasks/active/gone.md"), &target)
            .unwrap();
        assert!(target.exists());
        assert_eq!(files.stats().moves, 0);
    }

    #[test]
    fn delete_missing_file_is_ok() {
        let (_dir, files) = store();
        files.delete(&Task::new("never written")).unwrap();
        assert_eq!(files.stats().deletes, 0);
    }

    #[test]
    fn load_all_skips_corrupt_and_temp_files() {
        let (dir, files) = store();
        let good = Task::new("Good");
        files.write(&good).unwrap();

        let active = dir.path().join("tasks/active");
        fs::write(active.join("broken.md"), "---\nid: [oops\n---\n\n").unwrap();
        fs::write(active.join(".gtd-half.tmp"), "partial").unwrap();

        let loaded: Vec<(Task, PathBuf)> = files.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0.id, good.id);

        let issues = files.check::<Task>().unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.ends_with("broken.md"));
    }

    #[test]
    fn check_reports_duplicate_ids() {
        let (dir, files) = store();
        let task = Task::new("Twice");
        let path = files.write(&task).unwrap();
        fs::copy(&path, dir.path().join("tasks/archive/copy.md")).unwrap();

        let issues = files.check::<Task>().unwrap();
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].error, StoreError::DuplicateIdentifier(_)));
    }

    #[test]
    fn load_all_without_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = FileStore::new(dir.path().join("fresh"));
        assert!(files.load_all::<Task>().unwrap().is_empty());
    }

    #[test]
    fn no_temp_files_left_after_write() {
        let (dir, files) = store();
        let task = Task::new("Tidy");
        let path = files.write(&task).unwrap();
        let siblings: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(siblings.len(), 1);
        drop(dir);
    }
}
