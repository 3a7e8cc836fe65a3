//! Board records: on-disk shape, built-in seeds and auto-created boards.

use super::{Record, RecordStore};
use crate::error::{FrontmatterError, StoreError, StoreResult};
use crate::frontmatter;
use crate::paths::{self, Category, DEFAULT_SLUG_MAX_LEN, slugify};
use crate::query::Filter;
use crate::types::{Board, BoardLayout, BoardType, Column, Status, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::info;

/// Inactivity threshold given to auto-created boards.
pub const DEFAULT_AUTO_HIDE_DAYS: u32 = 30;

fn default_visible() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Serialize, Deserialize)]
struct BoardMetadata {
    id: String,
    #[serde(rename = "type")]
    board_type: BoardType,
    layout: BoardLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Filter::is_empty")]
    filter: Filter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    columns: Option<Vec<Column>>,
    #[serde(default = "default_visible", skip_serializing_if = "is_true")]
    visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_hide_days: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    built_in: bool,
}

impl Record for Board {
    const CATEGORY: Category = Category::Boards;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn display_name(&self) -> &str {
        self.display_title()
    }

    fn relative_path(&self, _slug_max_len: usize) -> PathBuf {
        paths::board_path(self)
    }

    fn to_document(&self) -> StoreResult<String> {
        let metadata = BoardMetadata {
            id: self.id.clone(),
            board_type: self.board_type,
            layout: self.layout,
            title: self.title.clone(),
            filter: self.filter.clone(),
            columns: self.columns.clone(),
            visible: self.visible,
            auto_hide_days: self.auto_hide_days,
            built_in: self.built_in,
        };
        frontmatter::generate(&metadata, &self.body).map_err(|e| StoreError::Serialize {
            id: self.id.clone(),
            message: e.to_string(),
        })
    }

    fn from_document(text: &str) -> Result<Self, FrontmatterError> {
        let (m, body) = frontmatter::parse_strict::<BoardMetadata>(text)?;
        Ok(Board {
            id: m.id,
            title: m.title,
            board_type: m.board_type,
            layout: m.layout,
            filter: m.filter,
            columns: m.columns,
            visible: m.visible,
            auto_hide_days: m.auto_hide_days,
            built_in: m.built_in,
            body,
        })
    }

    fn project(&self) -> Option<&str> {
        self.filter.project.as_deref()
    }

    fn context(&self) -> Option<&str> {
        self.filter.context.as_deref()
    }

    fn is_protected(&self) -> bool {
        self.built_in
    }
}

fn status_board(id: &str, status: Status) -> Board {
    let mut board = Board::new(id, BoardType::Status, BoardLayout::Kanban)
        .with_title(status.label())
        .with_filter(Filter {
            status: Some(status),
            ..Filter::default()
        });
    board.built_in = true;
    board
}

/// The four GTD list boards every store starts with.
pub fn builtin_boards() -> Vec<Board> {
    vec![
        status_board("inbox", Status::Inbox),
        status_board("next-actions", Status::NextAction),
        status_board("waiting", Status::Waiting),
        status_board("someday", Status::Someday),
    ]
}

fn auto_board(prefix: &str, board_type: BoardType, name: &str, filter: Filter) -> Board {
    let mut board = Board::new(
        format!("{}-{}", prefix, slugify(name, DEFAULT_SLUG_MAX_LEN)),
        board_type,
        BoardLayout::Freeform,
    )
    .with_title(name)
    .with_filter(filter);
    board.auto_hide_days = Some(DEFAULT_AUTO_HIDE_DAYS);
    board
}

/// Boards to create for projects and contexts that have none yet.
pub fn plan_auto_boards(existing: &[Board], projects: &[String], contexts: &[String]) -> Vec<Board> {
    let mut taken: BTreeSet<String> = existing.iter().map(|b| b.id.clone()).collect();
    let covered = |board_type: BoardType, name: &str| {
        existing.iter().any(|b| {
            b.board_type == board_type
                && match board_type {
                    BoardType::Project => b.filter.project.as_deref() == Some(name),
                    _ => b.filter.context.as_deref() == Some(name),
                }
        })
    };

    let mut planned = Vec::new();
    for project in projects {
        if covered(BoardType::Project, project) {
            continue;
        }
        let filter = Filter {
            project: Some(project.clone()),
            ..Filter::default()
        };
        let board = auto_board("project", BoardType::Project, project, filter);
        if taken.insert(board.id.clone()) {
            planned.push(board);
        }
    }
    for context in contexts {
        if covered(BoardType::Context, context) {
            continue;
        }
        let filter = Filter {
            context: Some(context.clone()),
            ..Filter::default()
        };
        let board = auto_board("context", BoardType::Context, context, filter);
        if taken.insert(board.id.clone()) {
            planned.push(board);
        }
    }
    planned
}

impl RecordStore<Board> {
    /// Add the built-in boards that are missing. Returns how many were added.
    pub async fn seed_builtins(&self) -> usize {
        let missing: Vec<Board> = builtin_boards()
            .into_iter()
            .filter(|b| !self.contains(&b.id))
            .collect();
        self.add_many(missing).await
    }

    pub fn visible(&self) -> Vec<Board> {
        self.filter(|b| b.visible)
    }

    pub fn by_type(&self, board_type: BoardType) -> Vec<Board> {
        self.filter(|b| b.board_type == board_type)
    }

    /// Create boards for newly observed projects and contexts.
    pub async fn sync_auto_boards(&self, projects: &[String], contexts: &[String]) -> usize {
        let planned = plan_auto_boards(&self.all(), projects, contexts);
        let added = self.add_many(planned).await;
        if added > 0 {
            info!(added, "created project/context boards");
        }
        added
    }

    /// Hide auto-created boards whose tasks have been idle past the
    /// board's threshold, and reveal hidden ones that saw activity again.
    /// Returns how many boards changed visibility.
    pub async fn apply_auto_hide(&self, tasks: &[Task], now: DateTime<Utc>) -> usize {
        let mut by_project: HashMap<&str, DateTime<Utc>> = HashMap::new();
        let mut by_context: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for task in tasks {
            if let Some(project) = task.project.as_deref() {
                let latest = by_project.entry(project).or_insert(task.modified);
                *latest = (*latest).max(task.modified);
            }
            if let Some(context) = task.context.as_deref() {
                let latest = by_context.entry(context).or_insert(task.modified);
                *latest = (*latest).max(task.modified);
            }
        }

        let changed: Vec<Board> = self
            .filter(|b| b.is_auto_created() && b.auto_hide_days.is_some())
            .into_iter()
            .filter_map(|mut board| {
                let last = match board.board_type {
                    BoardType::Project => board.filter.project.as_deref().and_then(|p| by_project.get(p)),
                    _ => board.filter.context.as_deref().and_then(|c| by_context.get(c)),
                };
                // No tasks at all counts as idle since forever.
                let hide = match last {
                    Some(last) => board.should_auto_hide(*last, now),
                    None => board.should_auto_hide(DateTime::<Utc>::MIN_UTC, now),
                };
                (board.visible == hide).then(|| {
                    board.visible = !hide;
                    board
                })
            })
            .collect();
        self.update_many(changed).await
    }
}
