//! Path resolution for record files.
//!
//! Maps a record's current field values to its canonical location under the
//! store root:
//! - `tasks/{active|archive}/<year>/<month>/<slug>-<id>.md`
//! - `boards/<board-id>.md`
//! - `perspectives/<perspective-id>.md`
//!
//! Everything here is pure string/path manipulation (no filesystem I/O), so
//! callers can compute where a record *should* live before deciding whether
//! a move is needed.

use crate::types::{Board, Task};
use chrono::Datelike;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Extension used for every record file.
pub const RECORD_EXTENSION: &str = "md";

/// Default maximum slug length in characters.
pub const DEFAULT_SLUG_MAX_LEN: usize = 50;

pub const TASKS_DIR: &str = "tasks";
pub const ACTIVE_DIR: &str = "active";
pub const ARCHIVE_DIR: &str = "archive";
pub const BOARDS_DIR: &str = "boards";
pub const PERSPECTIVES_DIR: &str = "perspectives";

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+").expect("static slug pattern"));

/// Record categories, one directory tree each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tasks,
    Boards,
    Perspectives,
}

impl Category {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Tasks => TASKS_DIR,
            Category::Boards => BOARDS_DIR,
            Category::Perspectives => PERSPECTIVES_DIR,
        }
    }
}

/// URL-safe slug: lowercase, non-alphanumeric runs collapsed to `-`,
/// truncated to `max_len`.
pub fn slugify(title: &str, max_len: usize) -> String {
    let lowered = title.to_lowercase();
    let collapsed = NON_ALNUM.replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');
    let truncated: String = trimmed.chars().take(max_len).collect();
    let slug = truncated.trim_end_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

/// Relative path of a task file. Depends only on status, creation
/// year/month (UTC), title and id.
pub fn task_path(task: &Task, slug_max_len: usize) -> PathBuf {
    let base = if task.is_terminal() {
        ARCHIVE_DIR
    } else {
        ACTIVE_DIR
    };
    PathBuf::from(TASKS_DIR)
        .join(base)
        .join(format!("{:04}", task.created.year()))
        .join(format!("{:02}", task.created.month()))
        .join(format!(
            "{}-{}.{}",
            slugify(&task.title, slug_max_len),
            task.id,
            RECORD_EXTENSION
        ))
}

/// Relative path of a board file.
pub fn board_path(board: &Board) -> PathBuf {
    PathBuf::from(BOARDS_DIR).join(format!("{}.{}", board.id, RECORD_EXTENSION))
}

/// Relative path of a perspective file.
pub fn perspective_path(id: &str) -> PathBuf {
    PathBuf::from(PERSPECTIVES_DIR).join(format!("{}.{}", id, RECORD_EXTENSION))
}

/// True for files the store owns (record extension, not a temp file).
pub fn is_record_file(path: &Path) -> bool {
    let is_hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !is_hidden && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
}

/// Directory skeleton of a store root.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    pub fn active_dir(&self) -> PathBuf {
        self.root.join(TASKS_DIR).join(ACTIVE_DIR)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(TASKS_DIR).join(ARCHIVE_DIR)
    }

    /// Every directory the store expects to exist.
    pub fn expected_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.active_dir(),
            self.archive_dir(),
            self.category_dir(Category::Boards),
            self.category_dir(Category::Perspectives),
        ]
    }

    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Classify an absolute path under the root by category.
    pub fn category_of(&self, path: &Path) -> Option<Category> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let first = relative.components().next()?.as_os_str().to_str()?;
        match first {
            TASKS_DIR => Some(Category::Tasks),
            BOARDS_DIR => Some(Category::Boards),
            PERSPECTIVES_DIR => Some(Category::Perspectives),
            _ => None,
        }
    }
}
