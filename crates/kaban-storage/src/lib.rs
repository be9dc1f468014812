//! SQLite storage and services for the kaban board engine.
//!
//! Provides the [`Storage`] trait and its SQLite implementation
//! ([`SqliteStore`]): board/column/task CRUD, the dependency graph with
//! cycle detection, the trigger-populated audit log, and Markdown
//! export/import.

pub mod error;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience.
pub use error::StorageError;
pub use sqlite::SqliteStore;
pub use traits::{ExportOptions, ImportReport, Storage};

// ---------------------------------------------------------------------------
// Storage trait implementation for SqliteStore
// ---------------------------------------------------------------------------

use kaban_core::audit::{AuditEntry, AuditFilter, AuditPage, AuditStats};
use kaban_core::board::{Board, BoardConfig};
use kaban_core::column::Column;
use kaban_core::filter::TaskFilter;
use kaban_core::link::{LinkType, TaskLinks};
use kaban_core::task::{NewTask, Task, TaskUpdates};

use crate::error::Result;

impl Storage for SqliteStore {
    fn initialize_board(&self, config: &BoardConfig, actor: &str) -> Result<Board> {
        self.initialize_board_impl(config, actor)
    }

    fn get_board(&self) -> Result<Board> {
        self.get_board_impl()
    }

    fn set_scorer(&self, name: &str, actor: &str) -> Result<Board> {
        self.set_scorer_impl(name, actor)
    }

    fn get_columns(&self) -> Result<Vec<Column>> {
        self.get_columns_impl()
    }

    fn get_column(&self, id_or_name: &str) -> Result<Column> {
        self.get_column_impl(id_or_name)
    }

    fn get_terminal_column(&self) -> Result<Column> {
        self.get_terminal_column_impl()
    }

    fn add_task(&self, new: &NewTask, actor: &str) -> Result<Task> {
        self.add_task_impl(new, actor)
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.get_task_impl(id)
    }

    fn resolve_task(&self, id: &str) -> Result<Task> {
        self.resolve_task_impl(id)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.list_tasks_impl(filter)
    }

    fn update_task(&self, id: &str, updates: &TaskUpdates, actor: &str) -> Result<Task> {
        self.update_task_impl(id, updates, actor)
    }

    fn move_task(&self, id: &str, column: &str, force: bool, actor: &str) -> Result<Task> {
        self.move_task_impl(id, column, force, actor)
    }

    fn archive_task(&self, id: &str, actor: &str) -> Result<Task> {
        self.archive_task_impl(id, actor)
    }

    fn restore_task(&self, id: &str, actor: &str) -> Result<Task> {
        self.restore_task_impl(id, actor)
    }

    fn delete_task(&self, id: &str, actor: &str) -> Result<()> {
        self.delete_task_impl(id, actor)
    }

    fn assign(&self, id: &str, agent: &str, actor: &str) -> Result<Task> {
        self.assign_impl(id, agent, actor)
    }

    fn unassign(&self, id: &str, actor: &str) -> Result<Task> {
        self.unassign_impl(id, actor)
    }

    fn add_link(&self, from: &str, to: &str, link_type: LinkType) -> Result<()> {
        self.add_link_impl(from, to, link_type)
    }

    fn remove_link(&self, from: &str, to: &str, link_type: LinkType) -> Result<()> {
        self.remove_link_impl(from, to, link_type)
    }

    fn add_dependency(&self, task: &str, blocker: &str) -> Result<()> {
        self.add_dependency_impl(task, blocker)
    }

    fn remove_dependency(&self, task: &str, blocker: &str) -> Result<()> {
        self.remove_dependency_impl(task, blocker)
    }

    fn get_links(&self, id: &str) -> Result<TaskLinks> {
        self.get_links_impl(id)
    }

    fn get_blockers(&self, id: &str) -> Result<Vec<Task>> {
        self.get_blockers_impl(id)
    }

    fn is_blocked(&self, id: &str) -> Result<bool> {
        self.is_blocked_impl(id)
    }

    fn blocking_count(&self, id: &str) -> Result<usize> {
        self.blocking_count_impl(id)
    }

    fn get_history(&self, filter: &AuditFilter) -> Result<AuditPage> {
        self.get_history_impl(filter)
    }

    fn get_task_history(&self, id: &str) -> Result<Vec<AuditEntry>> {
        self.get_task_history_impl(id)
    }

    fn get_recent_changes(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.get_recent_changes_impl(limit)
    }

    fn get_changes_by_actor(&self, actor: &str, limit: u32) -> Result<Vec<AuditEntry>> {
        self.get_changes_by_actor_impl(actor, limit)
    }

    fn get_audit_stats(&self) -> Result<AuditStats> {
        self.get_audit_stats_impl()
    }

    fn export_markdown(&self, opts: &ExportOptions) -> Result<String> {
        self.export_markdown_impl(opts)
    }

    fn import_markdown(&self, text: &str, actor: &str) -> Result<ImportReport> {
        self.import_markdown_impl(text, actor)
    }
}
