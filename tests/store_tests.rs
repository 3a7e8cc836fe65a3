//! Integration tests for the record stores.
//!
//! These tests run the stores against a temporary root and inspect the
//! files they leave behind.

use chrono::{TimeZone, Utc};
use gtd_store::error::StoreError;
use gtd_store::store::{BoardStore, FileStore, StoreOptions, TaskStore};
use gtd_store::types::{Status, Task};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Helper to create a fresh store root.
fn setup_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

async fn open_tasks(dir: &TempDir, debounce_ms: u64) -> TaskStore {
    TaskStore::open(
        FileStore::new(dir.path()),
        StoreOptions::default().with_debounce(Duration::from_millis(debounce_ms)),
    )
    .await
    .expect("Failed to open task store")
}

/// Every `.md` file under `root/tasks`, sorted.
fn task_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root.join("tasks"))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    files
}

fn files_for(root: &Path, id: &str) -> Vec<PathBuf> {
    task_files(root)
        .into_iter()
        .filter(|p| p.to_string_lossy().contains(id))
        .collect()
}

#[tokio::test]
async fn flushed_tasks_have_exactly_one_file_each() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 10_000).await;

    let tasks: Vec<Task> = (0..5).map(|i| Task::new(format!("Task {}", i))).collect();
    assert_eq!(store.add_many(tasks.clone()).await, 5);
    let mut renamed = tasks[2].clone();
    renamed.title = "A completely different title".to_string();
    assert!(store.update(renamed).await);
    store.flush().await.unwrap();

    assert_eq!(task_files(dir.path()).len(), 5);
    for task in &tasks {
        assert_eq!(files_for(dir.path(), &task.id.to_string()).len(), 1);
    }
}

#[tokio::test]
async fn rapid_updates_coalesce_into_one_write() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 100).await;

    let mut task = Task::new("Draft proposal");
    store.add(task.clone()).await;
    for i in 0..5 {
        task.body = format!("revision {}", i);
        store.update(task.clone()).await;
    }
    assert_eq!(store.stats().writes, 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(store.stats().writes, 1);
    assert_eq!(store.pending_count(), 0);

    let path = store.location(&task.id.to_string()).await.unwrap();
    let on_disk = std::fs::read_to_string(path).unwrap();
    assert!(on_disk.contains("revision 4"));
}

#[tokio::test]
async fn corrupt_file_does_not_hide_valid_ones() {
    let dir = setup_dir();
    {
        let store = open_tasks(&dir, 10_000).await;
        store.add(Task::new("Water plants")).await;
        store.add(Task::new("Pay rent")).await;
        store.flush().await.unwrap();
    }
    let month_dir = task_files(dir.path())[0].parent().unwrap().to_path_buf();
    std::fs::write(month_dir.join("broken-task.md"), "---\nid: [unterminated\n---\n").unwrap();
    std::fs::write(month_dir.join("no-frontmatter.md"), "just some notes\n").unwrap();

    let store = open_tasks(&dir, 10_000).await;
    assert_eq!(store.len(), 2);

    let issues = store.files().check::<Task>().unwrap();
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|i| i.error.is_parse_failure()));
}

#[tokio::test]
async fn completing_moves_file_to_archive_of_creation_month() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 10_000).await;

    let created = Utc.with_ymd_and_hms(2025, 11, 20, 9, 0, 0).unwrap();
    let task = Task::new_at("File taxes", created).with_status(Status::NextAction);
    let id = task.id;
    store.save_immediately(task).await.unwrap();

    let before = files_for(dir.path(), &id.to_string());
    assert_eq!(before.len(), 1);
    assert!(before[0].starts_with(dir.path().join("tasks/active/2025/11")));

    let completed = store.complete(id, Utc::now()).await.unwrap();
    assert_eq!(completed.status, Status::Completed);
    assert!(completed.completed_at.is_some());
    store.flush().await.unwrap();

    let after = files_for(dir.path(), &id.to_string());
    assert_eq!(after.len(), 1);
    assert!(after[0].starts_with(dir.path().join("tasks/archive/2025/11")));
    assert!(!before[0].exists());
}

#[tokio::test]
async fn reopening_moves_file_back_to_active() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 10_000).await;

    let task = Task::new("Return library books").with_status(Status::Completed);
    let id = task.id;
    store.save_immediately(task).await.unwrap();
    assert!(files_for(dir.path(), &id.to_string())[0].to_string_lossy().contains("archive"));

    store.reopen(id, Status::NextAction, Utc::now()).await.unwrap();
    store.flush().await.unwrap();

    let files = files_for(dir.path(), &id.to_string());
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().contains("active"));
    assert_eq!(store.task(id).unwrap().completed_at, None);
}

#[tokio::test]
async fn bulk_delete_leaves_the_rest() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 10_000).await;

    let tasks: Vec<Task> = (0..6).map(|i| Task::new(format!("Chore {}", i))).collect();
    store.add_many(tasks.clone()).await;
    store.flush().await.unwrap();

    let doomed: Vec<String> = tasks[..2].iter().map(|t| t.id.to_string()).collect();
    let mut ids: Vec<&str> = doomed.iter().map(String::as_str).collect();
    ids.push("not-a-known-id");
    assert_eq!(store.delete_many(&ids).await.unwrap(), 2);

    assert_eq!(store.len(), 4);
    assert_eq!(task_files(dir.path()).len(), 4);
    for id in &doomed {
        assert!(!store.contains(id));
        assert!(files_for(dir.path(), id).is_empty());
    }
}

#[tokio::test]
async fn delete_of_unwritten_record_still_removes_it() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 10_000).await;

    let task = Task::new("Never persisted");
    store.add(task.clone()).await;
    assert!(store.delete(&task.id.to_string()).await.unwrap());
    store.flush().await.unwrap();

    assert!(store.is_empty());
    assert!(task_files(dir.path()).is_empty());
}

#[tokio::test]
async fn save_immediately_writes_without_waiting() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 60_000).await;

    let task = Task::new("Book flights").with_project("Trip");
    store.save_immediately(task.clone()).await.unwrap();

    assert_eq!(store.stats().writes, 1);
    assert_eq!(store.pending_count(), 0);
    assert_eq!(files_for(dir.path(), &task.id.to_string()).len(), 1);
    assert_eq!(store.projects(), vec!["Trip".to_string()]);
}

#[tokio::test]
async fn reload_picks_up_external_edits() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 10_000).await;

    let task = Task::new("Original title");
    store.save_immediately(task.clone()).await.unwrap();

    let path = store.location(&task.id.to_string()).await.unwrap();
    let edited = std::fs::read_to_string(&path)
        .unwrap()
        .replace("title: Original title", "title: Edited by hand");
    std::fs::write(&path, edited).unwrap();

    let changes = store.subscribe();
    store.reload().await.unwrap();

    assert_eq!(store.task(task.id).unwrap().title, "Edited by hand");
    let change = changes.latest().unwrap();
    assert!(change.touches(&task.id.to_string()));
}

#[tokio::test]
async fn dropping_last_handle_persists_pending_records() {
    let dir = setup_dir();
    let task = Task::new("Written on drop");
    {
        let store = open_tasks(&dir, 60_000).await;
        store.add(task.clone()).await;
        assert_eq!(store.pending_count(), 1);
    }

    let reopened = open_tasks(&dir, 60_000).await;
    assert_eq!(reopened.task(task.id).unwrap().title, "Written on drop");
}

#[tokio::test]
async fn builtin_boards_cannot_be_deleted() {
    let dir = setup_dir();
    let boards = BoardStore::open(FileStore::new(dir.path()), StoreOptions::default())
        .await
        .unwrap();
    assert_eq!(boards.seed_builtins().await, 4);
    assert_eq!(boards.seed_builtins().await, 0);

    let err = boards.delete("inbox").await.unwrap_err();
    assert!(matches!(err, StoreError::Protected(id) if id == "inbox"));
    assert!(boards.contains("inbox"));
}

#[tokio::test]
async fn auto_boards_follow_task_projects() {
    let dir = setup_dir();
    let files = FileStore::new(dir.path());
    let tasks = TaskStore::open(files.clone(), StoreOptions::default())
        .await
        .unwrap();
    let boards = BoardStore::open(files, StoreOptions::default()).await.unwrap();

    tasks
        .add(Task::new("Paint fence").with_project("Garden").with_context("@home"))
        .await;
    let added = boards
        .sync_auto_boards(&tasks.projects(), &tasks.contexts())
        .await;
    assert_eq!(added, 2);
    assert!(boards.contains("project-garden"));
    assert!(boards.contains("context-home"));

    // Auto-created boards are not protected.
    assert!(boards.delete("project-garden").await.unwrap());
}

#[tokio::test]
async fn flush_writes_records_added_since_open() {
    let dir = setup_dir();
    let task = Task::new("Buy milk");
    {
        let store = open_tasks(&dir, 50).await;
        assert!(store.add(task.clone()).await);
        store.flush().await.unwrap();
        assert_eq!(store.stats().writes, 1);
        assert_eq!(store.pending_count(), 0);

        // The original timer fires after the flush and finds nothing left.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.stats().writes, 1);
    }

    let reopened = open_tasks(&dir, 50).await;
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.task(task.id).unwrap().title, "Buy milk");
    assert_eq!(files_for(dir.path(), &task.id.to_string()).len(), 1);
}

#[tokio::test]
async fn blank_titles_never_reach_disk() {
    let dir = setup_dir();
    {
        let store = open_tasks(&dir, 50).await;
        assert!(!store.add(Task::new("   ")).await);
        assert_eq!(store.add_many(vec![Task::new(""), Task::new("Real one")]).await, 1);

        let err = store.save_immediately(Task::new("\t")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));

        let mut kept = store.all()[0].clone();
        kept.title = " ".to_string();
        assert!(!store.update(kept).await);

        store.flush().await.unwrap();
        assert_eq!(store.len(), 1);
    }

    assert_eq!(task_files(dir.path()).len(), 1);
    let reopened = open_tasks(&dir, 50).await;
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.all()[0].title, "Real one");
    assert!(reopened.files().check::<Task>().unwrap().is_empty());
}

#[tokio::test]
async fn failed_background_write_stays_pending_until_flush() {
    let dir = setup_dir();
    let store = open_tasks(&dir, 50).await;

    // A plain file where the year directory belongs makes the write fail.
    let active = dir.path().join("tasks/active");
    std::fs::create_dir_all(&active).unwrap();
    let blocker = active.join("2025");
    std::fs::write(&blocker, "not a directory").unwrap();

    let created = Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap();
    let task = Task::new_at("Blocked", created);
    assert!(store.add(task.clone()).await);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.pending_count(), 1);
    assert_eq!(store.stats().writes, 0);
    assert!(store.flush().await.is_err());
    assert_eq!(store.pending_count(), 1);

    std::fs::remove_file(&blocker).unwrap();
    store.flush().await.unwrap();
    assert_eq!(store.pending_count(), 0);
    let files = files_for(dir.path(), &task.id.to_string());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with(dir.path().join("tasks/active/2025/01")));
}
