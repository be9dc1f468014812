//! Task link operations and cycle detection for [`SqliteStore`].

use std::collections::{HashMap, HashSet};

use rusqlite::{Connection, params};

use kaban_core::link::{LinkType, TaskLinks};
use kaban_core::task::Task;

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tasks::{
    TASK_COLUMNS_PREFIXED, attach_depends_on, resolve_task_on_conn, scan_task,
};

// ---------------------------------------------------------------------------
// Connection-level helpers
// ---------------------------------------------------------------------------

/// Inserts a link and its mirror, with cycle detection for blocking types.
///
/// The cycle check and the insert share the caller's transaction, so no
/// racing writer can slip a second edge past the check.
pub(crate) fn add_link_on_conn(
    conn: &Connection,
    from: &str,
    to: &str,
    link_type: LinkType,
) -> Result<()> {
    if from == to {
        let me = short_ref(conn, from);
        return Err(StorageError::Cycle {
            path: vec![me.clone(), me],
        });
    }

    if link_type.affects_blocking() {
        // Orient the candidate as blocked_by(a, b): a waits on b.
        let (a, b) = match link_type {
            LinkType::BlockedBy => (from, to),
            _ => (to, from),
        };
        detect_cycle(conn, a, b)?;
    }

    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_links
         WHERE from_task_id = ?1 AND to_task_id = ?2 AND link_type = ?3",
        params![from, to, link_type.as_str()],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Err(StorageError::DuplicateLink {
            from: short_ref(conn, from),
            to: short_ref(conn, to),
            link_type: link_type.as_str().to_string(),
        });
    }

    conn.execute(
        "INSERT INTO task_links (from_task_id, to_task_id, link_type) VALUES (?1, ?2, ?3)",
        params![from, to, link_type.as_str()],
    )?;
    // Mirror edge; ignore an already-present twin.
    conn.execute(
        "INSERT OR IGNORE INTO task_links (from_task_id, to_task_id, link_type)
         VALUES (?1, ?2, ?3)",
        params![to, from, link_type.mirror().as_str()],
    )?;

    Ok(())
}

/// Removes a link and its mirror.
pub(crate) fn remove_link_on_conn(
    conn: &Connection,
    from: &str,
    to: &str,
    link_type: LinkType,
) -> Result<()> {
    let affected = conn.execute(
        "DELETE FROM task_links
         WHERE (from_task_id = ?1 AND to_task_id = ?2 AND link_type = ?3)
            OR (from_task_id = ?2 AND to_task_id = ?1 AND link_type = ?4)",
        params![from, to, link_type.as_str(), link_type.mirror().as_str()],
    )?;
    if affected == 0 {
        return Err(StorageError::not_found(
            "link",
            format!("{from} {} {to}", link_type.as_str()),
        ));
    }
    Ok(())
}

/// Returns the open, non-archived tasks currently blocking the given task.
pub(crate) fn get_blockers_on_conn(conn: &Connection, task_id: &str) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS_PREFIXED} FROM tasks
         INNER JOIN task_links l ON tasks.id = l.to_task_id
         WHERE l.from_task_id = ?1
           AND l.link_type = 'blocked_by'
           AND tasks.completed_at IS NULL
           AND tasks.archived = 0
         ORDER BY tasks.board_task_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![task_id], scan_task)?;
    let mut blockers = Vec::new();
    for row in rows {
        blockers.push(row?);
    }
    Ok(blockers)
}

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

/// Rejects the candidate edge `blocked_by(a, b)` if `a` is reachable from
/// `b` over the live `blocked_by` graph.
///
/// Depth-first, O(V+E) on the current edges, read fresh from the database
/// inside the caller's transaction. On rejection the error carries the full
/// cycle `a -> b -> ... -> a` as short refs.
fn detect_cycle(conn: &Connection, a: &str, b: &str) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT to_task_id FROM task_links
         WHERE from_task_id = ?1 AND link_type = 'blocked_by'",
    )?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut parent: HashMap<String, String> = HashMap::new();
    let mut stack: Vec<String> = vec![b.to_string()];
    visited.insert(b.to_string());

    while let Some(current) = stack.pop() {
        if current == a {
            // Reconstruct b -> ... -> a, then close the loop at a.
            let mut chain = vec![current.clone()];
            let mut node = current;
            while let Some(prev) = parent.get(&node) {
                chain.push(prev.clone());
                node = prev.clone();
            }
            chain.reverse(); // b .. a
            let mut path = vec![a.to_string()];
            path.extend(chain);
            return Err(StorageError::Cycle {
                path: path.iter().map(|id| short_ref(conn, id)).collect(),
            });
        }

        let rows = stmt.query_map(params![current], |row| row.get::<_, String>(0))?;
        for row in rows {
            let next = row?;
            if visited.insert(next.clone()) {
                parent.insert(next.clone(), current.clone());
                stack.push(next);
            }
        }
    }

    Ok(())
}

/// Display form for cycle paths and duplicate errors: `#N` when the task
/// still exists, the raw id otherwise.
fn short_ref(conn: &Connection, task_id: &str) -> String {
    conn.query_row(
        "SELECT board_task_id FROM tasks WHERE id = ?1",
        params![task_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| format!("#{n}"))
    .unwrap_or_else(|_| task_id.to_string())
}

// ---------------------------------------------------------------------------
// SqliteStore link methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Adds a link between two tasks (given by raw id arguments or ids).
    pub fn add_link_impl(&self, from: &str, to: &str, link_type: LinkType) -> Result<()> {
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            let from_task = resolve_task_on_conn(&tx, from)?;
            let to_task = resolve_task_on_conn(&tx, to)?;
            add_link_on_conn(&tx, &from_task.id, &to_task.id, link_type)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Removes a link between two tasks.
    pub fn remove_link_impl(&self, from: &str, to: &str, link_type: LinkType) -> Result<()> {
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            let from_task = resolve_task_on_conn(&tx, from)?;
            let to_task = resolve_task_on_conn(&tx, to)?;
            remove_link_on_conn(&tx, &from_task.id, &to_task.id, link_type)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Declares that `task` is blocked by `blocker`.
    pub fn add_dependency_impl(&self, task: &str, blocker: &str) -> Result<()> {
        self.add_link_impl(task, blocker, LinkType::BlockedBy)
    }

    /// Removes a blocked-by dependency.
    pub fn remove_dependency_impl(&self, task: &str, blocker: &str) -> Result<()> {
        self.remove_link_impl(task, blocker, LinkType::BlockedBy)
    }

    /// Returns all links of a task, grouped by direction.
    pub fn get_links_impl(&self, raw: &str) -> Result<TaskLinks> {
        let conn = self.lock_conn()?;
        let task = resolve_task_on_conn(&conn, raw)?;

        let mut stmt = conn.prepare(
            "SELECT to_task_id, link_type FROM task_links
             WHERE from_task_id = ?1
             ORDER BY created_at, to_task_id",
        )?;
        let rows = stmt.query_map(params![task.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut links = TaskLinks::default();
        for row in rows {
            let (to, kind) = row?;
            match kind.parse::<LinkType>() {
                Ok(LinkType::Blocks) => links.blocks.push(to),
                Ok(LinkType::BlockedBy) => links.blocked_by.push(to),
                Ok(LinkType::Related) => links.related.push(to),
                Err(_) => {}
            }
        }
        Ok(links)
    }

    /// Returns the open tasks currently blocking the given task.
    pub fn get_blockers_impl(&self, raw: &str) -> Result<Vec<Task>> {
        let conn = self.lock_conn()?;
        let task = resolve_task_on_conn(&conn, raw)?;
        let mut blockers = get_blockers_on_conn(&conn, &task.id)?;
        attach_depends_on(&conn, &mut blockers)?;
        Ok(blockers)
    }

    /// Returns `true` iff the task has at least one open blocker.
    pub fn is_blocked_impl(&self, raw: &str) -> Result<bool> {
        Ok(!self.get_blockers_impl(raw)?.is_empty())
    }

    /// How many open, non-archived tasks this task currently blocks. Feeds
    /// the `blocking` scorer.
    pub fn blocking_count_impl(&self, raw: &str) -> Result<usize> {
        let conn = self.lock_conn()?;
        let task = resolve_task_on_conn(&conn, raw)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM task_links l
             JOIN tasks t ON t.id = l.to_task_id
             WHERE l.from_task_id = ?1
               AND l.link_type = 'blocks'
               AND t.completed_at IS NULL
               AND t.archived = 0",
            params![task.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
