//! Audit log queries for [`SqliteStore`].
//!
//! Rows are written exclusively by the triggers installed in migration
//! `0003_audit_triggers`; this module only reads.

use rusqlite::{Row, params};

use kaban_core::audit::{AuditEntry, AuditFilter, AuditPage, AuditStats};
use kaban_core::id::{IdQuery, classify};

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tasks::{format_datetime, parse_datetime, resolve_task_on_conn};

/// All audit columns in a deterministic order for SELECT queries.
const AUDIT_COLUMNS: &str = r#"
    id, timestamp, event_type, object_type, object_id,
    field_name, old_value, new_value, actor
"#;

/// Deserialises a row into an [`AuditEntry`]. Order must match
/// [`AUDIT_COLUMNS`].
fn scan_audit_entry(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let event_type: String = row.get("event_type")?;
    let object_type: String = row.get("object_type")?;
    Ok(AuditEntry {
        id: row.get("id")?,
        timestamp: parse_datetime(&row.get::<_, String>("timestamp")?),
        event_type: event_type.parse().map_err(bad_enum)?,
        object_type: object_type.parse().map_err(bad_enum)?,
        object_id: row.get("object_id")?,
        field_name: row.get("field_name")?,
        old_value: row.get("old_value")?,
        new_value: row.get("new_value")?,
        actor: row.get("actor")?,
    })
}

fn bad_enum(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

impl SqliteStore {
    /// Queries the audit log with optional filters, newest first.
    ///
    /// `total` counts all rows matching the filter; `has_more` is computed
    /// by over-fetching one row past the requested page.
    pub fn get_history_impl(&self, filter: &AuditFilter) -> Result<AuditPage> {
        let conn = self.lock_conn()?;

        let mut where_clauses: Vec<String> = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut param_idx = 1;

        if let Some(object_type) = filter.object_type {
            where_clauses.push(format!("object_type = ?{param_idx}"));
            param_values.push(Box::new(object_type.as_str().to_string()));
            param_idx += 1;
        }
        if let Some(ref object_id) = filter.object_id {
            where_clauses.push(format!("object_id = ?{param_idx}"));
            param_values.push(Box::new(object_id.clone()));
            param_idx += 1;
        }
        if let Some(event_type) = filter.event_type {
            where_clauses.push(format!("event_type = ?{param_idx}"));
            param_values.push(Box::new(event_type.as_str().to_string()));
            param_idx += 1;
        }
        if let Some(ref actor) = filter.actor {
            where_clauses.push(format!("actor = ?{param_idx}"));
            param_values.push(Box::new(actor.clone()));
            param_idx += 1;
        }
        if let Some(since) = filter.since {
            where_clauses.push(format!("timestamp >= ?{param_idx}"));
            param_values.push(Box::new(format_datetime(&since)));
            param_idx += 1;
        }
        if let Some(until) = filter.until {
            where_clauses.push(format!("timestamp <= ?{param_idx}"));
            param_values.push(Box::new(format_datetime(&until)));
            param_idx += 1;
        }
        let _ = param_idx;

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM audit_log {where_sql}"),
            param_refs.as_slice(),
            |row| row.get::<_, i64>(0),
        )? as u64;

        let limit = filter.effective_limit();
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log {where_sql}
             ORDER BY timestamp DESC, id DESC
             LIMIT {} OFFSET {}",
            limit + 1,
            filter.offset
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), scan_audit_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }

        let has_more = entries.len() > limit as usize;
        entries.truncate(limit as usize);

        Ok(AuditPage {
            entries,
            total,
            has_more,
        })
    }

    /// Full history of one task, oldest first.
    ///
    /// Accepts any task id argument. Deleted tasks remain queryable: a full
    /// id or prefix is matched against the log directly, and a short id is
    /// recovered from the `shortId` recorded in CREATE summaries.
    pub fn get_task_history_impl(&self, raw: &str) -> Result<Vec<AuditEntry>> {
        let object_id = self.audit_object_id(raw)?;
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log
             WHERE object_type = 'task' AND object_id = ?1
             ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![object_id], scan_audit_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// The most recent changes across all objects.
    pub fn get_recent_changes_impl(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        let page = self.get_history_impl(&AuditFilter {
            limit: Some(limit),
            ..Default::default()
        })?;
        Ok(page.entries)
    }

    /// The most recent changes by one actor.
    pub fn get_changes_by_actor_impl(&self, actor: &str, limit: u32) -> Result<Vec<AuditEntry>> {
        let page = self.get_history_impl(&AuditFilter {
            actor: Some(actor.to_string()),
            limit: Some(limit),
            ..Default::default()
        })?;
        Ok(page.entries)
    }

    /// Aggregate counts by event and object type, plus the ten most
    /// recently active distinct actors.
    pub fn get_audit_stats_impl(&self) -> Result<AuditStats> {
        let conn = self.lock_conn()?;

        let mut stats = AuditStats {
            total_entries: conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| {
                row.get::<_, i64>(0)
            })? as u64,
            ..Default::default()
        };

        let mut stmt =
            conn.prepare("SELECT event_type, COUNT(*) FROM audit_log GROUP BY event_type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (event, count) = row?;
            stats.by_event.insert(event, count as u64);
        }

        let mut stmt =
            conn.prepare("SELECT object_type, COUNT(*) FROM audit_log GROUP BY object_type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (object, count) = row?;
            stats.by_object.insert(object, count as u64);
        }

        let mut stmt = conn.prepare(
            "SELECT actor FROM audit_log
             WHERE actor IS NOT NULL
             GROUP BY actor
             ORDER BY MAX(id) DESC
             LIMIT 10",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            stats.recent_actors.push(row?);
        }

        Ok(stats)
    }

    /// Maps a raw task id argument to the audit `object_id`, falling back to
    /// the log itself for tasks that no longer exist.
    fn audit_object_id(&self, raw: &str) -> Result<String> {
        let conn = self.lock_conn()?;
        match resolve_task_on_conn(&conn, raw) {
            Ok(task) => return Ok(task.id),
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => {}
        }

        match classify(raw) {
            Some(IdQuery::Full(id)) => Ok(id),
            Some(IdQuery::Short(n)) => conn
                .query_row(
                    "SELECT object_id FROM audit_log
                     WHERE object_type = 'task' AND event_type = 'CREATE'
                       AND json_extract(new_value, '$.shortId') = ?1
                     ORDER BY id DESC LIMIT 1",
                    params![n],
                    |row| row.get(0),
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("task", raw),
                    other => StorageError::Query(other),
                }),
            Some(IdQuery::Prefix(prefix)) => {
                let pattern = format!("{prefix}%");
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT object_id FROM audit_log
                     WHERE object_type = 'task' AND object_id LIKE ?1
                     LIMIT 2",
                )?;
                let rows = stmt.query_map(params![pattern], |row| row.get::<_, String>(0))?;
                let ids: Vec<String> = rows.collect::<rusqlite::Result<_>>()?;
                match ids.len() {
                    0 => Err(StorageError::not_found("task", raw)),
                    1 => Ok(ids.into_iter().next().expect("one id")),
                    n => Err(StorageError::AmbiguousId { prefix, matches: n }),
                }
            }
            None => Err(StorageError::not_found("task", raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaban_core::audit::{EventType, ObjectType};
    use kaban_core::board::BoardConfig;
    use kaban_core::task::{NewTask, TaskUpdates};
    use pretty_assertions::assert_eq;

    fn test_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .initialize_board_impl(&BoardConfig::standard("B"), "user")
            .unwrap();
        store
    }

    #[test]
    fn create_is_audited_with_actor() {
        let store = test_store();
        let task = store.add_task_impl(&NewTask::new("T"), "user").unwrap();

        let history = store.get_task_history_impl(&task.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, EventType::Create);
        assert_eq!(history[0].object_type, ObjectType::Task);
        assert_eq!(history[0].actor.as_deref(), Some("user"));
        let summary = history[0].new_value.as_deref().unwrap();
        assert!(summary.contains("\"title\":\"T\""));
        assert!(summary.contains("\"columnId\":\"todo\""));
    }

    #[test]
    fn update_audits_each_changed_field_once() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("Before"), "user").unwrap();

        store
            .update_task_impl(
                "#1",
                &TaskUpdates {
                    title: Some("After".into()),
                    description: Some("New description".into()),
                    ..Default::default()
                },
                "claude",
            )
            .unwrap();

        let history = store.get_task_history_impl("#1").unwrap();
        let updates: Vec<&AuditEntry> = history
            .iter()
            .filter(|e| e.event_type == EventType::Update)
            .collect();
        assert_eq!(updates.len(), 2);

        let title = updates
            .iter()
            .find(|e| e.field_name.as_deref() == Some("title"))
            .unwrap();
        assert_eq!(title.old_value.as_deref(), Some("Before"));
        assert_eq!(title.new_value.as_deref(), Some("After"));
        assert_eq!(title.actor.as_deref(), Some("claude"));
    }

    #[test]
    fn unchanged_field_produces_no_audit_row() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("Same"), "user").unwrap();
        store
            .update_task_impl(
                "#1",
                &TaskUpdates {
                    title: Some("Same".into()),
                    ..Default::default()
                },
                "user",
            )
            .unwrap();
        let history = store.get_task_history_impl("#1").unwrap();
        assert_eq!(history.len(), 1); // just the CREATE
    }

    #[test]
    fn lifecycle_event_sequence() {
        let store = test_store();
        let task = store.add_task_impl(&NewTask::new("T"), "user").unwrap();
        store
            .update_task_impl(
                "#1",
                &TaskUpdates {
                    title: Some("T2".into()),
                    ..Default::default()
                },
                "user",
            )
            .unwrap();
        store.move_task_impl("#1", "done", false, "user").unwrap();
        store.delete_task_impl("#1", "user").unwrap();

        let history = store.get_task_history_impl(&task.id).unwrap();
        let shape: Vec<(EventType, Option<&str>)> = history
            .iter()
            .map(|e| (e.event_type, e.field_name.as_deref()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (EventType::Create, None),
                (EventType::Update, Some("title")),
                (EventType::Update, Some("columnId")),
                (EventType::Delete, None),
            ]
        );
        let moved = &history[2];
        assert_eq!(moved.old_value.as_deref(), Some("todo"));
        assert_eq!(moved.new_value.as_deref(), Some("done"));
    }

    #[test]
    fn history_by_short_id_survives_delete() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("Gone"), "user").unwrap();
        store.delete_task_impl("#1", "user").unwrap();

        let history = store.get_task_history_impl("#1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].event_type, EventType::Delete);
    }

    #[test]
    fn filters_and_pagination() {
        let store = test_store();
        for i in 0..5 {
            store
                .add_task_impl(&NewTask::new(format!("T{i}")), "claude")
                .unwrap();
        }

        let page = store
            .get_history_impl(&AuditFilter {
                object_type: Some(ObjectType::Task),
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        // Newest first.
        assert!(page.entries[0].id > page.entries[1].id);

        let page = store
            .get_history_impl(&AuditFilter {
                object_type: Some(ObjectType::Task),
                limit: Some(2),
                offset: 4,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert!(!page.has_more);

        let by_actor = store.get_changes_by_actor_impl("claude", 10).unwrap();
        assert_eq!(by_actor.len(), 5);
        let by_nobody = store.get_changes_by_actor_impl("nobody", 10).unwrap();
        assert!(by_nobody.is_empty());
    }

    #[test]
    fn stats_aggregate() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("A"), "alice").unwrap();
        store.add_task_impl(&NewTask::new("B"), "bob").unwrap();
        store.delete_task_impl("#2", "bob").unwrap();

        let stats = store.get_audit_stats_impl().unwrap();
        // 1 board + 5 columns + 2 tasks created, 1 task deleted.
        assert_eq!(stats.total_entries, 9);
        assert_eq!(stats.by_event.get("CREATE"), Some(&8));
        assert_eq!(stats.by_event.get("DELETE"), Some(&1));
        assert_eq!(stats.by_object.get("task"), Some(&3));
        assert_eq!(stats.by_object.get("column"), Some(&5));
        // Most recent actor first.
        assert_eq!(stats.recent_actors[0], "bob");
        assert!(stats.recent_actors.contains(&"alice".to_string()));
    }
}
