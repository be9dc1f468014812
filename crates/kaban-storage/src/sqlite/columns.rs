//! Column operations for [`SqliteStore`].

use rusqlite::{Connection, Row, params};

use kaban_core::column::Column;

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tasks::parse_datetime;

/// All column columns in a deterministic order for SELECT queries.
pub(crate) const COLUMN_COLUMNS: &str = r#"
    id, board_id, name, position, wip_limit, is_terminal,
    created_by, updated_by, created_at, updated_at
"#;

/// Deserialises a row into a [`Column`]. Order must match [`COLUMN_COLUMNS`].
pub(crate) fn scan_column(row: &Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get("id")?,
        board_id: row.get("board_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        wip_limit: row.get("wip_limit")?,
        is_terminal: row.get::<_, i32>("is_terminal")? != 0,
        created_by: row.get::<_, Option<String>>("created_by")?.unwrap_or_default(),
        updated_by: row.get::<_, Option<String>>("updated_by")?.unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

/// Resolves a column by id, then by case-insensitive name.
pub(crate) fn get_column_on_conn(conn: &Connection, id_or_name: &str) -> Result<Column> {
    let sql = format!(
        "SELECT {COLUMN_COLUMNS} FROM columns
         WHERE id = ?1 OR lower(name) = lower(?1)
         ORDER BY id = ?1 DESC
         LIMIT 1"
    );
    conn.query_row(&sql, params![id_or_name], scan_column)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("column", id_or_name),
            other => StorageError::Query(other),
        })
}

/// Counts non-archived tasks in a column, used for WIP enforcement.
pub(crate) fn column_task_count(conn: &Connection, column_id: &str) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE column_id = ?1 AND archived = 0",
        params![column_id],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

impl SqliteStore {
    /// Returns all columns ordered by position.
    pub fn get_columns_impl(&self) -> Result<Vec<Column>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {COLUMN_COLUMNS} FROM columns ORDER BY position");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], scan_column)?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    /// Resolves a column by id or case-insensitive display name.
    pub fn get_column_impl(&self, id_or_name: &str) -> Result<Column> {
        let conn = self.lock_conn()?;
        get_column_on_conn(&conn, id_or_name)
    }

    /// Returns the first terminal column.
    pub fn get_terminal_column_impl(&self) -> Result<Column> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {COLUMN_COLUMNS} FROM columns WHERE is_terminal = 1 ORDER BY position LIMIT 1"
        );
        conn.query_row(&sql, [], scan_column).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StorageError::not_found("column", "no terminal column")
            }
            other => StorageError::Query(other),
        })
    }
}
