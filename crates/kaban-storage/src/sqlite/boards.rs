//! Board operations for [`SqliteStore`].

use rusqlite::{Connection, Row, params};
use tracing::info;

use kaban_core::board::{Board, BoardConfig};
use kaban_core::id::new_global_id;
use kaban_core::validation::validate_column_id;

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tasks::{format_datetime, parse_datetime};

/// All board columns in a deterministic order for SELECT queries.
pub(crate) const BOARD_COLUMNS: &str = r#"
    id, name, scorer, max_board_task_id,
    created_by, updated_by, created_at, updated_at
"#;

/// Deserialises a row into a [`Board`]. Column order must match
/// [`BOARD_COLUMNS`].
pub(crate) fn scan_board(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get("id")?,
        name: row.get("name")?,
        scorer: row.get("scorer")?,
        max_board_task_id: row.get("max_board_task_id")?,
        created_by: row.get::<_, Option<String>>("created_by")?.unwrap_or_default(),
        updated_by: row.get::<_, Option<String>>("updated_by")?.unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

/// Returns the board on the given connection. v1 databases hold exactly one.
pub(crate) fn get_board_on_conn(conn: &Connection) -> Result<Board> {
    let sql = format!("SELECT {BOARD_COLUMNS} FROM boards ORDER BY created_at LIMIT 1");
    conn.query_row(&sql, [], scan_board).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("board", "no board initialized")
        }
        other => StorageError::Query(other),
    })
}

impl SqliteStore {
    /// Creates the board and its columns from the given config.
    ///
    /// Idempotent: if a board already exists, it is returned untouched and
    /// the config is ignored.
    pub fn initialize_board_impl(&self, config: &BoardConfig, actor: &str) -> Result<Board> {
        if config.name.trim().is_empty() {
            return Err(StorageError::validation("board name is required"));
        }
        if config.columns.is_empty() {
            return Err(StorageError::validation("at least one column is required"));
        }
        for spec in &config.columns {
            validate_column_id(&spec.id)?;
        }

        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;

            let existing: i64 =
                tx.query_row("SELECT COUNT(*) FROM boards", [], |row| row.get(0))?;
            if existing > 0 {
                let board = get_board_on_conn(&tx)?;
                tx.commit()?;
                return Ok(board);
            }

            let board_id = new_global_id();
            let now_str = format_datetime(&chrono::Utc::now());

            tx.execute(
                "INSERT INTO boards (id, name, scorer, max_board_task_id,
                                     created_by, updated_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4, ?5, ?5)",
                params![board_id, config.name, config.scorer, actor, now_str],
            )?;

            for (position, spec) in config.columns.iter().enumerate() {
                tx.execute(
                    "INSERT INTO columns (id, board_id, name, position, wip_limit, is_terminal,
                                          created_by, updated_by, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?8)",
                    params![
                        spec.id,
                        board_id,
                        spec.name,
                        position as i64,
                        spec.wip_limit,
                        spec.terminal as i32,
                        actor,
                        now_str,
                    ],
                )?;
            }

            let board = get_board_on_conn(&tx)?;
            tx.commit()?;
            info!(board = %board.name, columns = config.columns.len(), "board initialized");
            Ok(board)
        })
    }

    /// Returns the board.
    pub fn get_board_impl(&self) -> Result<Board> {
        let conn = self.lock_conn()?;
        get_board_on_conn(&conn)
    }

    /// Sets the board's active scorer.
    pub fn set_scorer_impl(&self, name: &str, actor: &str) -> Result<Board> {
        if name.trim().is_empty() {
            return Err(StorageError::validation("scorer name is required"));
        }
        self.with_retry(|conn| {
            let board = get_board_on_conn(conn)?;
            let now_str = format_datetime(&chrono::Utc::now());
            conn.execute(
                "UPDATE boards SET scorer = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4",
                params![name, actor, now_str, board.id],
            )?;
            get_board_on_conn(conn)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn initialize_creates_board_and_columns() {
        let store = test_store();
        let board = store
            .initialize_board_impl(&BoardConfig::standard("Test Board"), "user")
            .unwrap();
        assert_eq!(board.name, "Test Board");
        assert_eq!(board.scorer, "combined");
        assert_eq!(board.max_board_task_id, 0);

        let columns = store.get_columns_impl().unwrap();
        assert_eq!(columns.len(), 5);
        assert_eq!(columns[0].id, "backlog");
    }

    #[test]
    fn initialize_is_idempotent() {
        let store = test_store();
        let first = store
            .initialize_board_impl(&BoardConfig::standard("First"), "user")
            .unwrap();
        let second = store
            .initialize_board_impl(&BoardConfig::standard("Second"), "user")
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "First");
    }

    #[test]
    fn initialize_rejects_bad_column_ids() {
        let store = test_store();
        let mut config = BoardConfig::standard("B");
        config.columns[0].id = "Not A Slug".into();
        let err = store.initialize_board_impl(&config, "user").unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[test]
    fn get_board_before_init_is_not_found() {
        let store = test_store();
        assert!(store.get_board_impl().unwrap_err().is_not_found());
    }

    #[test]
    fn set_scorer_updates_board() {
        let store = test_store();
        store
            .initialize_board_impl(&BoardConfig::standard("B"), "user")
            .unwrap();
        let board = store.set_scorer_impl("fifo", "claude").unwrap();
        assert_eq!(board.scorer, "fifo");
        assert_eq!(board.updated_by, "claude");
    }

    #[test]
    fn board_init_audited() {
        let store = test_store();
        store
            .initialize_board_impl(&BoardConfig::standard("B"), "user")
            .unwrap();
        let conn = store.lock_conn().unwrap();
        let board_creates: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM audit_log WHERE object_type = 'board' AND event_type = 'CREATE'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let column_creates: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM audit_log WHERE object_type = 'column' AND event_type = 'CREATE'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(board_creates, 1);
        assert_eq!(column_creates, 5);
    }
}
