//! Task CRUD operations for [`SqliteStore`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use kaban_core::filter::TaskFilter;
use kaban_core::id::{IdQuery, classify, new_global_id};
use kaban_core::link::LinkType;
use kaban_core::task::{NewTask, Task, TaskUpdates};
use kaban_core::validation::{
    validate_agent_name, validate_description, validate_labels, validate_title,
};

use crate::error::{Result, StorageError};
use crate::sqlite::columns::{column_task_count, get_column_on_conn};
use crate::sqlite::links::{add_link_on_conn, get_blockers_on_conn};
use crate::sqlite::store::SqliteStore;

// ---------------------------------------------------------------------------
// Column list (shared between INSERT and SELECT)
// ---------------------------------------------------------------------------

/// All task columns in a deterministic order for SELECT queries.
pub(crate) const TASK_COLUMNS: &str = r#"
    id, board_id, board_task_id, column_id, title, description, position,
    created_by, assigned_to, parent_id, labels, files, blocked_reason,
    version, due_date, started_at, completed_at, archived, archived_at,
    updated_by, created_at, updated_at
"#;

/// Same as [`TASK_COLUMNS`] but prefixed with `tasks.` for JOIN queries,
/// where `created_at` would otherwise be ambiguous with `task_links`.
pub(crate) const TASK_COLUMNS_PREFIXED: &str = r#"
    tasks.id, tasks.board_id, tasks.board_task_id, tasks.column_id, tasks.title,
    tasks.description, tasks.position, tasks.created_by, tasks.assigned_to,
    tasks.parent_id, tasks.labels, tasks.files, tasks.blocked_reason,
    tasks.version, tasks.due_date, tasks.started_at, tasks.completed_at,
    tasks.archived, tasks.archived_at, tasks.updated_by, tasks.created_at,
    tasks.updated_at
"#;

// ---------------------------------------------------------------------------
// Row scanning
// ---------------------------------------------------------------------------

/// Deserialises a row into a [`Task`].
///
/// The column order MUST match [`TASK_COLUMNS`]. `depends_on` is left empty;
/// callers attach it from the link table.
pub(crate) fn scan_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let labels_str: String = row.get("labels")?;
    let files_str: String = row.get("files")?;

    Ok(Task {
        id: row.get("id")?,
        board_id: row.get("board_id")?,
        board_task_id: row.get("board_task_id")?,
        column_id: row.get("column_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        position: row.get("position")?,
        created_by: row.get::<_, Option<String>>("created_by")?.unwrap_or_default(),
        assigned_to: row.get("assigned_to")?,
        parent_id: row.get("parent_id")?,
        labels: serde_json::from_str(&labels_str).unwrap_or_default(),
        files: serde_json::from_str(&files_str).unwrap_or_default(),
        blocked_reason: row.get("blocked_reason")?,
        version: row.get("version")?,
        due_date: row
            .get::<_, Option<String>>("due_date")?
            .as_deref()
            .map(parse_datetime),
        started_at: row
            .get::<_, Option<String>>("started_at")?
            .as_deref()
            .map(parse_datetime),
        completed_at: row
            .get::<_, Option<String>>("completed_at")?
            .as_deref()
            .map(parse_datetime),
        archived: row.get::<_, i32>("archived")? != 0,
        archived_at: row
            .get::<_, Option<String>>("archived_at")?
            .as_deref()
            .map(parse_datetime),
        updated_by: row.get::<_, Option<String>>("updated_by")?.unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
        depends_on: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Datetime helpers
// ---------------------------------------------------------------------------

/// Formats a `DateTime<Utc>` as ISO 8601 TEXT for SQLite.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parses an ISO 8601 TEXT string from SQLite into a `DateTime<Utc>`.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ"))
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .map(|ndt| ndt.and_utc())
            .unwrap_or_else(|_| Utc::now())
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with links, audit, export)
// ---------------------------------------------------------------------------

/// Retrieves a single task by global id on the given connection.
pub(crate) fn get_task_on_conn(conn: &Connection, id: &str) -> Result<Task> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
    let mut task = conn
        .query_row(&sql, params![id], scan_task)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("task", id),
            other => StorageError::Query(other),
        })?;
    attach_depends_on(conn, std::slice::from_mut(&mut task))?;
    Ok(task)
}

/// Resolves a task from a raw id argument: `#N`, bare `N`, a full global id,
/// or a >=4-char global-id prefix.
pub(crate) fn resolve_task_on_conn(conn: &Connection, raw: &str) -> Result<Task> {
    match classify(raw) {
        None => Err(StorageError::not_found("task", raw)),
        Some(IdQuery::Full(id)) => get_task_on_conn(conn, &id),
        Some(IdQuery::Short(n)) => {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE board_task_id = ?1");
            let mut task = conn
                .query_row(&sql, params![n], scan_task)
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("task", raw),
                    other => StorageError::Query(other),
                })?;
            attach_depends_on(conn, std::slice::from_mut(&mut task))?;
            Ok(task)
        }
        Some(IdQuery::Prefix(prefix)) => {
            let pattern = format!("{prefix}%");
            let matches: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE id LIKE ?1",
                params![pattern],
                |row| row.get(0),
            )?;
            match matches {
                0 => Err(StorageError::not_found("task", raw)),
                1 => {
                    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id LIKE ?1");
                    let mut task = conn.query_row(&sql, params![pattern], scan_task)?;
                    attach_depends_on(conn, std::slice::from_mut(&mut task))?;
                    Ok(task)
                }
                n => Err(StorageError::AmbiguousId {
                    prefix,
                    matches: n as usize,
                }),
            }
        }
    }
}

/// Populates `depends_on` for each task from its `blocked_by` links.
pub(crate) fn attach_depends_on(conn: &Connection, tasks: &mut [Task]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT to_task_id FROM task_links
         WHERE from_task_id = ?1 AND link_type = 'blocked_by'
         ORDER BY created_at, to_task_id",
    )?;
    for task in tasks {
        let rows = stmt.query_map(params![task.id], |row| row.get::<_, String>(0))?;
        let mut deps = Vec::new();
        for row in rows {
            deps.push(row?);
        }
        task.depends_on = deps;
    }
    Ok(())
}

/// Inserts a task row, allocating its short id and position atomically.
///
/// The `board_task_id` comes from one statement over the board's high-water
/// mark and the live maximum, and the mark is raised in the same transaction,
/// so a deleted task's short id can never be handed out again.
pub(crate) fn insert_task_on_conn(
    conn: &Connection,
    id: &str,
    board_id: &str,
    column_id: &str,
    new: &NewTask,
    completed_at: Option<DateTime<Utc>>,
    actor: &str,
) -> Result<()> {
    let now_str = format_datetime(&Utc::now());
    let labels_str = serde_json::to_string(&new.labels)?;
    let files_str = serde_json::to_string(&new.files)?;
    let due_date_str = new.due_date.as_ref().map(format_datetime);
    let completed_at_str = completed_at.as_ref().map(format_datetime);

    conn.execute(
        "INSERT INTO tasks (id, board_id, board_task_id, column_id, title, description,
                            position, created_by, assigned_to, parent_id, labels, files,
                            version, due_date, completed_at, updated_by, created_at, updated_at)
         VALUES (?1, ?2,
                 (SELECT MAX(n) + 1 FROM (
                      SELECT max_board_task_id AS n FROM boards WHERE id = ?2
                      UNION ALL
                      SELECT COALESCE(MAX(board_task_id), 0) FROM tasks WHERE board_id = ?2)),
                 ?3, ?4, ?5,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE column_id = ?3),
                 ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12, ?6, ?13, ?13)",
        params![
            id,
            board_id,
            column_id,
            new.title,
            new.description,
            actor,
            new.assigned_to,
            new.parent_id,
            labels_str,
            files_str,
            due_date_str,
            completed_at_str,
            now_str,
        ],
    )?;

    conn.execute(
        "UPDATE boards SET max_board_task_id = (SELECT board_task_id FROM tasks WHERE id = ?1)
         WHERE id = ?2",
        params![id, board_id],
    )?;

    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteStore task methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Creates a task, allocating a fresh global id, a per-board short id and
    /// the next position in its column. Declared dependencies are linked in
    /// the same transaction, so a cycle rejection leaves nothing behind.
    pub fn add_task_impl(&self, new: &NewTask, actor: &str) -> Result<Task> {
        validate_title(&new.title)?;
        validate_description(&new.description)?;
        validate_labels(&new.labels)?;
        if let Some(ref assignee) = new.assigned_to {
            validate_agent_name(assignee)?;
        }

        let id = new_global_id();
        self.with_retry(|conn| {
            self.check_cancelled()?;
            let tx = conn.unchecked_transaction()?;

            let column_ref = new.column_id.as_deref().unwrap_or("todo");
            let column = get_column_on_conn(&tx, column_ref)?;

            // Resolve declared dependencies before inserting anything so a
            // bad reference fails without a partial write.
            let mut blockers = Vec::new();
            for dep_ref in &new.depends_on {
                blockers.push(resolve_task_on_conn(&tx, dep_ref)?.id);
            }

            insert_task_on_conn(&tx, &id, &column.board_id, &column.id, new, None, actor)?;

            for blocker_id in &blockers {
                add_link_on_conn(&tx, &id, blocker_id, LinkType::BlockedBy)?;
            }

            let task = get_task_on_conn(&tx, &id)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Looks a task up by id argument; `Ok(None)` when nothing matches.
    pub fn get_task_impl(&self, raw: &str) -> Result<Option<Task>> {
        match self.resolve_task_impl(raw) {
            Ok(task) => Ok(Some(task)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolves a task by `#N`, bare short id, full global id, or prefix.
    pub fn resolve_task_impl(&self, raw: &str) -> Result<Task> {
        let conn = self.lock_conn()?;
        resolve_task_on_conn(&conn, raw)
    }

    /// Lists tasks ordered by `(column_id, position)`. Archived tasks are
    /// excluded unless the filter requests them.
    pub fn list_tasks_impl(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.lock_conn()?;

        let mut where_clauses: Vec<String> = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut param_idx = 1;

        if !filter.include_archived {
            where_clauses.push("archived = 0".to_string());
        }
        if let Some(ref column_id) = filter.column_id {
            where_clauses.push(format!("column_id = ?{param_idx}"));
            param_values.push(Box::new(column_id.clone()));
            param_idx += 1;
        }
        if let Some(ref agent) = filter.assigned_to {
            where_clauses.push(format!("assigned_to = ?{param_idx}"));
            param_values.push(Box::new(agent.clone()));
            param_idx += 1;
        }
        if let Some(blocked) = filter.blocked {
            let exists = "EXISTS (
                SELECT 1 FROM task_links l
                JOIN tasks b ON b.id = l.to_task_id
                WHERE l.from_task_id = tasks.id
                  AND l.link_type = 'blocked_by'
                  AND b.completed_at IS NULL
                  AND b.archived = 0)";
            if blocked {
                where_clauses.push(exists.to_string());
            } else {
                where_clauses.push(format!("NOT {exists}"));
            }
        }
        let _ = param_idx;

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks {where_sql} ORDER BY column_id, position"
        );

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), scan_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        attach_depends_on(&conn, &mut tasks)?;
        Ok(tasks)
    }

    /// Applies partial updates to a task. Only fields that actually differ
    /// from the stored row are written; `version` increments regardless.
    pub fn update_task_impl(
        &self,
        raw: &str,
        updates: &TaskUpdates,
        actor: &str,
    ) -> Result<Task> {
        if let Some(ref title) = updates.title {
            validate_title(title)?;
        }
        if let Some(ref description) = updates.description {
            validate_description(description)?;
        }
        if let Some(ref labels) = updates.labels {
            validate_labels(labels)?;
        }
        if let Some(Some(ref assignee)) = updates.assigned_to {
            validate_agent_name(assignee)?;
        }

        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            let task = resolve_task_on_conn(&tx, raw)?;

            if let Some(expected) = updates.expected_version {
                if task.version != expected {
                    return Err(StorageError::VersionConflict {
                        id: task.id,
                        expected,
                        actual: task.version,
                    });
                }
            }
            if updates.is_empty() {
                tx.commit()?;
                return Ok(task);
            }

            let mut set_clauses: Vec<String> = Vec::new();
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(ref title) = updates.title {
                if *title != task.title {
                    set_clauses.push("title = ?".to_string());
                    param_values.push(Box::new(title.clone()));
                }
            }
            if let Some(ref description) = updates.description {
                if *description != task.description {
                    set_clauses.push("description = ?".to_string());
                    param_values.push(Box::new(description.clone()));
                }
            }
            if let Some(ref assigned) = updates.assigned_to {
                if *assigned != task.assigned_to {
                    set_clauses.push("assigned_to = ?".to_string());
                    param_values.push(Box::new(assigned.clone()));
                }
            }
            if let Some(ref labels) = updates.labels {
                if *labels != task.labels {
                    set_clauses.push("labels = ?".to_string());
                    param_values.push(Box::new(serde_json::to_string(labels)?));
                }
            }
            if let Some(ref files) = updates.files {
                if *files != task.files {
                    set_clauses.push("files = ?".to_string());
                    param_values.push(Box::new(serde_json::to_string(files)?));
                }
            }
            if let Some(ref reason) = updates.blocked_reason {
                if *reason != task.blocked_reason {
                    set_clauses.push("blocked_reason = ?".to_string());
                    param_values.push(Box::new(reason.clone()));
                }
            }
            if let Some(ref due) = updates.due_date {
                if *due != task.due_date {
                    set_clauses.push("due_date = ?".to_string());
                    param_values.push(Box::new(due.as_ref().map(format_datetime)));
                }
            }
            if let Some(ref completed) = updates.completed_at {
                if *completed != task.completed_at {
                    set_clauses.push("completed_at = ?".to_string());
                    param_values.push(Box::new(completed.as_ref().map(format_datetime)));
                }
            }
            if let Some(ref parent) = updates.parent_id {
                if *parent != task.parent_id {
                    set_clauses.push("parent_id = ?".to_string());
                    param_values.push(Box::new(parent.clone()));
                }
            }

            // Version, actor and timestamp always advance on an update.
            set_clauses.push("version = version + 1".to_string());
            set_clauses.push("updated_by = ?".to_string());
            param_values.push(Box::new(actor.to_string()));
            set_clauses.push("updated_at = ?".to_string());
            param_values.push(Box::new(format_datetime(&Utc::now())));

            let sql = format!("UPDATE tasks SET {} WHERE id = ?", set_clauses.join(", "));
            param_values.push(Box::new(task.id.clone()));
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();
            tx.execute(&sql, param_refs.as_slice())?;

            let updated = get_task_on_conn(&tx, &task.id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Moves a task to another column.
    ///
    /// Enforces the target's WIP limit unless `force` is set, refuses moves
    /// of blocked tasks into working columns, stamps `started_at` on first
    /// entry to `in_progress` and `completed_at` on entry to a terminal
    /// column.
    pub fn move_task_impl(
        &self,
        raw: &str,
        target_column: &str,
        force: bool,
        actor: &str,
    ) -> Result<Task> {
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            let task = resolve_task_on_conn(&tx, raw)?;

            let column = get_column_on_conn(&tx, target_column).map_err(|e| match e {
                StorageError::NotFound { .. } => {
                    StorageError::validation(format!("unknown column: {target_column}"))
                }
                other => other,
            })?;

            if !force {
                if let Some(limit) = column.wip_limit {
                    let mut count = column_task_count(&tx, &column.id)?;
                    if task.column_id == column.id && !task.archived {
                        count = count.saturating_sub(1);
                    }
                    if count >= limit {
                        return Err(StorageError::validation(format!(
                            "Column '{}' at WIP limit ({count}/{limit})",
                            column.name
                        )));
                    }
                }
            }

            // Blocked tasks may retreat to the backlog or land in a terminal
            // column, but not enter working columns.
            if !column.is_terminal && column.id != "backlog" {
                let blockers = get_blockers_on_conn(&tx, &task.id)?;
                if !blockers.is_empty() {
                    return Err(StorageError::Blocked {
                        task_ref: task.short_ref(),
                        blockers: blockers.iter().map(|b| b.short_ref()).collect(),
                    });
                }
            }

            let now = Utc::now();
            let now_str = format_datetime(&now);
            let started_at = if column.id == "in_progress" && task.started_at.is_none() {
                Some(now_str.clone())
            } else {
                task.started_at.as_ref().map(format_datetime)
            };
            let completed_at = if column.is_terminal && task.completed_at.is_none() {
                Some(now_str.clone())
            } else {
                task.completed_at.as_ref().map(format_datetime)
            };

            tx.execute(
                "UPDATE tasks SET
                     column_id = ?1,
                     position = (SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE column_id = ?1),
                     started_at = ?2,
                     completed_at = ?3,
                     version = version + 1,
                     updated_by = ?4,
                     updated_at = ?5
                 WHERE id = ?6",
                params![column.id, started_at, completed_at, actor, now_str, task.id],
            )?;

            let moved = get_task_on_conn(&tx, &task.id)?;
            tx.commit()?;
            Ok(moved)
        })
    }

    /// Archives a task (soft delete, reversible).
    pub fn archive_task_impl(&self, raw: &str, actor: &str) -> Result<Task> {
        self.with_retry(|conn| {
            let task = resolve_task_on_conn(conn, raw)?;
            let now_str = format_datetime(&Utc::now());
            conn.execute(
                "UPDATE tasks SET archived = 1, archived_at = ?1,
                        version = version + 1, updated_by = ?2, updated_at = ?1
                 WHERE id = ?3",
                params![now_str, actor, task.id],
            )?;
            get_task_on_conn(conn, &task.id)
        })
    }

    /// Restores an archived task.
    pub fn restore_task_impl(&self, raw: &str, actor: &str) -> Result<Task> {
        self.with_retry(|conn| {
            let task = resolve_task_on_conn(conn, raw)?;
            let now_str = format_datetime(&Utc::now());
            conn.execute(
                "UPDATE tasks SET archived = 0, archived_at = NULL,
                        version = version + 1, updated_by = ?1, updated_at = ?2
                 WHERE id = ?3",
                params![actor, now_str, task.id],
            )?;
            get_task_on_conn(conn, &task.id)
        })
    }

    /// Deletes a task. Links cascade; the DELETE trigger records the
    /// pre-image.
    pub fn delete_task_impl(&self, raw: &str, actor: &str) -> Result<()> {
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            let task = resolve_task_on_conn(&tx, raw)?;
            // The delete trigger reads updated_by for its actor column.
            tx.execute(
                "UPDATE tasks SET updated_by = ?1 WHERE id = ?2",
                params![actor, task.id],
            )?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task.id])?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Assigns a task to an agent.
    pub fn assign_impl(&self, raw: &str, agent: &str, actor: &str) -> Result<Task> {
        validate_agent_name(agent)?;
        let updates = TaskUpdates {
            assigned_to: Some(Some(agent.to_string())),
            ..Default::default()
        };
        self.update_task_impl(raw, &updates, actor)
    }

    /// Clears a task's assignee.
    pub fn unassign_impl(&self, raw: &str, actor: &str) -> Result<Task> {
        let updates = TaskUpdates {
            assigned_to: Some(None),
            ..Default::default()
        };
        self.update_task_impl(raw, &updates, actor)
    }
}
