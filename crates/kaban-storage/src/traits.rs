//! The [`Storage`] trait -- the one contract every front-end codes against.
//!
//! The CLI, TUI and MCP server depend on this trait rather than on
//! [`SqliteStore`](crate::SqliteStore) directly, so alternative backends
//! (mocks, proxies) can be substituted in tests.

use kaban_core::audit::{AuditEntry, AuditFilter, AuditPage, AuditStats};
use kaban_core::board::{Board, BoardConfig};
use kaban_core::column::Column;
use kaban_core::filter::TaskFilter;
use kaban_core::link::{LinkType, TaskLinks};
use kaban_core::task::{NewTask, Task, TaskUpdates};

use crate::error::Result;

/// Options for Markdown export.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Emit `<!-- id:... -->` trailers for lossless re-import.
    pub include_metadata: bool,
    /// Include archived tasks.
    pub include_archived: bool,
}

/// Result summary of a Markdown import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Name of the board that received the import.
    pub board: String,
    /// Columns created because the document named ones the board lacked.
    pub columns_created: usize,
    /// Tasks inserted.
    pub tasks_created: usize,
    /// Tasks skipped because their metadata id already exists.
    pub tasks_skipped: usize,
    /// Non-fatal parse errors, with line numbers.
    pub errors: Vec<kaban_markdown::ParseError>,
}

/// The full service API over one board database.
pub trait Storage: Send + Sync {
    // -- Board & columns -----------------------------------------------------

    /// Creates the board and columns from `config`; a no-op when a board
    /// already exists.
    fn initialize_board(&self, config: &BoardConfig, actor: &str) -> Result<Board>;

    fn get_board(&self) -> Result<Board>;

    /// Sets the board's active scorer by name.
    fn set_scorer(&self, name: &str, actor: &str) -> Result<Board>;

    /// All columns ordered by position.
    fn get_columns(&self) -> Result<Vec<Column>>;

    /// Resolves a column by slug id or case-insensitive display name.
    fn get_column(&self, id_or_name: &str) -> Result<Column>;

    /// The first terminal column.
    fn get_terminal_column(&self) -> Result<Column>;

    // -- Tasks ---------------------------------------------------------------

    fn add_task(&self, new: &NewTask, actor: &str) -> Result<Task>;

    /// Resolves an id argument to a task; `Ok(None)` when nothing matches,
    /// an error only for ambiguous prefixes or store failures.
    fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// Like [`get_task`](Self::get_task) but a miss is an error.
    fn resolve_task(&self, id: &str) -> Result<Task>;

    /// Tasks ordered by `(column_id, position)`.
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    fn update_task(&self, id: &str, updates: &TaskUpdates, actor: &str) -> Result<Task>;

    fn move_task(&self, id: &str, column: &str, force: bool, actor: &str) -> Result<Task>;

    fn archive_task(&self, id: &str, actor: &str) -> Result<Task>;

    fn restore_task(&self, id: &str, actor: &str) -> Result<Task>;

    fn delete_task(&self, id: &str, actor: &str) -> Result<()>;

    fn assign(&self, id: &str, agent: &str, actor: &str) -> Result<Task>;

    fn unassign(&self, id: &str, actor: &str) -> Result<Task>;

    // -- Links ---------------------------------------------------------------

    fn add_link(&self, from: &str, to: &str, link_type: LinkType) -> Result<()>;

    fn remove_link(&self, from: &str, to: &str, link_type: LinkType) -> Result<()>;

    /// Declares `task` blocked by `blocker`.
    fn add_dependency(&self, task: &str, blocker: &str) -> Result<()>;

    fn remove_dependency(&self, task: &str, blocker: &str) -> Result<()>;

    fn get_links(&self, id: &str) -> Result<TaskLinks>;

    /// Open, non-archived tasks currently blocking the given task.
    fn get_blockers(&self, id: &str) -> Result<Vec<Task>>;

    fn is_blocked(&self, id: &str) -> Result<bool>;

    /// How many open tasks the given task blocks (for the scoring layer).
    fn blocking_count(&self, id: &str) -> Result<usize>;

    // -- Audit ---------------------------------------------------------------

    fn get_history(&self, filter: &AuditFilter) -> Result<AuditPage>;

    /// One task's history, oldest first. Works for deleted tasks too.
    fn get_task_history(&self, id: &str) -> Result<Vec<AuditEntry>>;

    fn get_recent_changes(&self, limit: u32) -> Result<Vec<AuditEntry>>;

    fn get_changes_by_actor(&self, actor: &str, limit: u32) -> Result<Vec<AuditEntry>>;

    fn get_audit_stats(&self) -> Result<AuditStats>;

    // -- Markdown ------------------------------------------------------------

    fn export_markdown(&self, opts: &ExportOptions) -> Result<String>;

    fn import_markdown(&self, text: &str, actor: &str) -> Result<ImportReport>;
}
