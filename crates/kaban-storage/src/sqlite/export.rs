//! Markdown export/import orchestration for [`SqliteStore`].
//!
//! The codec itself lives in `kaban-markdown`; this module bridges it to the
//! live board. Export builds a [`BoardDoc`] in column/position order; import
//! creates the board, missing columns and tasks inside one explicit
//! transaction, so a failed import leaves no trace.

use rusqlite::params;
use tracing::info;

use kaban_core::id::{is_base32, new_global_id};
use kaban_core::task::NewTask;
use kaban_markdown::{BoardDoc, ColumnDoc, SerializeOptions, TaskDoc};

use crate::error::{Result, StorageError};
use crate::sqlite::boards::get_board_on_conn;
use crate::sqlite::columns::{COLUMN_COLUMNS, scan_column};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tasks::{TASK_COLUMNS, format_datetime, insert_task_on_conn, scan_task};
use crate::traits::{ExportOptions, ImportReport};

impl SqliteStore {
    /// Serialises the board to Taskell Markdown.
    pub fn export_markdown_impl(&self, opts: &ExportOptions) -> Result<String> {
        let doc = self.build_board_doc(opts)?;
        Ok(kaban_markdown::serialize(
            &doc,
            SerializeOptions {
                include_metadata: opts.include_metadata,
            },
        ))
    }

    /// Builds the document model for export.
    fn build_board_doc(&self, opts: &ExportOptions) -> Result<BoardDoc> {
        let conn = self.lock_conn()?;
        let board = get_board_on_conn(&conn)?;

        let mut doc = BoardDoc {
            name: board.name,
            columns: Vec::new(),
        };

        let column_sql = format!(
            "SELECT {COLUMN_COLUMNS} FROM columns WHERE board_id = ?1 ORDER BY position"
        );
        let mut column_stmt = conn.prepare(&column_sql)?;
        let columns: Vec<_> = column_stmt
            .query_map(params![board.id], scan_column)?
            .collect::<rusqlite::Result<_>>()?;

        let archived_sql = if opts.include_archived {
            ""
        } else {
            "AND archived = 0"
        };
        let task_sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE column_id = ?1 {archived_sql}
             ORDER BY position, id"
        );
        let mut task_stmt = conn.prepare(&task_sql)?;

        for column in columns {
            let tasks: Vec<_> = task_stmt
                .query_map(params![column.id], scan_task)?
                .collect::<rusqlite::Result<_>>()?;

            doc.columns.push(ColumnDoc {
                name: column.name,
                wip_limit: column.wip_limit,
                terminal: column.is_terminal,
                tasks: tasks
                    .into_iter()
                    .map(|t| TaskDoc {
                        title: t.title,
                        id: Some(t.id),
                        due_date: t.due_date.map(|d| d.date_naive()),
                        completed: t.completed_at.is_some(),
                        labels: t.labels,
                        assigned_to: t.assigned_to,
                        description: t.description,
                    })
                    .collect(),
            });
        }

        Ok(doc)
    }

    /// Imports a Taskell Markdown document.
    ///
    /// Creates the board when none exists, creates columns that are missing
    /// (matched by case-insensitive name), and inserts tasks. Tasks whose
    /// metadata id already exists in the database are skipped rather than
    /// overwritten. The whole import is one transaction.
    pub fn import_markdown_impl(&self, text: &str, actor: &str) -> Result<ImportReport> {
        let (doc, parse_errors) = kaban_markdown::parse(text);
        if doc.name.is_empty() {
            return Err(StorageError::validation(
                "document has no `# <board>` header",
            ));
        }

        self.with_retry(|conn| {
            self.check_cancelled()?;
            let tx = conn.unchecked_transaction()?;

            let mut report = ImportReport {
                errors: parse_errors.clone(),
                ..Default::default()
            };

            // First import into an empty database creates the board shell
            // inside the same transaction as its tasks.
            let board = match get_board_on_conn(&tx) {
                Ok(board) => board,
                Err(e) if e.is_not_found() => create_board_from_doc(&tx, &doc, actor, &mut report)?,
                Err(e) => return Err(e),
            };
            report.board = board.name.clone();

            for column_doc in &doc.columns {
                self.check_cancelled()?;
                let column_id =
                    ensure_column(&tx, &board.id, column_doc, actor, &mut report)?;

                for task_doc in &column_doc.tasks {
                    if let Some(ref id) = task_doc.id {
                        let known: i64 = tx.query_row(
                            "SELECT COUNT(*) FROM tasks WHERE id = ?1",
                            params![id],
                            |row| row.get(0),
                        )?;
                        if known > 0 {
                            report.tasks_skipped += 1;
                            continue;
                        }
                    }

                    let id = match task_doc.id {
                        Some(ref given) if given.len() == 26 && is_base32(given) => given.clone(),
                        _ => new_global_id(),
                    };
                    let new = NewTask {
                        title: task_doc.title.clone(),
                        description: task_doc.description.clone(),
                        assigned_to: task_doc.assigned_to.clone(),
                        labels: task_doc.labels.clone(),
                        due_date: task_doc
                            .due_date
                            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc()),
                        ..NewTask::default()
                    };
                    let completed_at = task_doc.completed.then(chrono::Utc::now);
                    insert_task_on_conn(&tx, &id, &board.id, &column_id, &new, completed_at, actor)?;
                    report.tasks_created += 1;
                }
            }

            tx.commit()?;
            info!(
                board = %report.board,
                created = report.tasks_created,
                skipped = report.tasks_skipped,
                "markdown import complete"
            );
            Ok(report)
        })
    }

}

/// Creates the board row and its columns from the document, on the caller's
/// transaction.
fn create_board_from_doc(
    conn: &rusqlite::Connection,
    doc: &BoardDoc,
    actor: &str,
    report: &mut ImportReport,
) -> Result<kaban_core::board::Board> {
    let board_id = new_global_id();
    let now_str = format_datetime(&chrono::Utc::now());
    conn.execute(
        "INSERT INTO boards (id, name, scorer, max_board_task_id,
                             created_by, updated_by, created_at, updated_at)
         VALUES (?1, ?2, 'combined', 0, ?3, ?3, ?4, ?4)",
        params![board_id, doc.name, actor, now_str],
    )?;
    for column_doc in &doc.columns {
        ensure_column(conn, &board_id, column_doc, actor, report)?;
    }
    get_board_on_conn(conn)
}

/// Finds a column by case-insensitive name, creating it at the end of the
/// board when missing.
fn ensure_column(
    conn: &rusqlite::Connection,
    board_id: &str,
    column_doc: &ColumnDoc,
    actor: &str,
    report: &mut ImportReport,
) -> Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM columns WHERE board_id = ?1 AND lower(name) = lower(?2)",
            params![board_id, column_doc.name],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(StorageError::Query(other)),
        })?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = slugify(&column_doc.name);
    let now_str = format_datetime(&chrono::Utc::now());
    conn.execute(
        "INSERT INTO columns (id, board_id, name, position, wip_limit, is_terminal,
                              created_by, updated_by, created_at, updated_at)
         VALUES (?1, ?2, ?3,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM columns WHERE board_id = ?2),
                 ?4, ?5, ?6, ?6, ?7, ?7)",
        params![
            id,
            board_id,
            column_doc.name,
            column_doc.wip_limit,
            column_doc.terminal as i32,
            actor,
            now_str,
        ],
    )?;
    report.columns_created += 1;
    Ok(id)
}

/// Turns a display name into a column slug (`In Progress` -> `in_progress`).
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("column");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaban_core::board::BoardConfig;
    use kaban_core::task::TaskUpdates;
    use pretty_assertions::assert_eq;

    fn test_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .initialize_board_impl(&BoardConfig::standard("Test Board"), "user")
            .unwrap();
        store
    }

    #[test]
    fn slugify_display_names() {
        assert_eq!(slugify("In Progress"), "in_progress");
        assert_eq!(slugify("Done"), "done");
        assert_eq!(slugify("Q3 -- Goals!"), "q3_goals");
        assert_eq!(slugify("¡¡¡"), "column");
    }

    #[test]
    fn export_orders_and_annotates() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("First"), "user").unwrap();
        store.add_task_impl(&NewTask::new("Second"), "user").unwrap();

        let text = store
            .export_markdown_impl(&ExportOptions {
                include_metadata: false,
                include_archived: false,
            })
            .unwrap();

        assert!(text.starts_with("# Test Board\n"));
        let first = text.find("- First").unwrap();
        let second = text.find("- Second").unwrap();
        assert!(first < second);
        assert!(text.contains("<!-- WIP Limit: 3 -->"));
        assert!(text.contains("<!-- Terminal column -->"));
    }

    #[test]
    fn export_hides_archived_by_default() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("Visible"), "user").unwrap();
        store.add_task_impl(&NewTask::new("Hidden"), "user").unwrap();
        store.archive_task_impl("#2", "user").unwrap();

        let text = store
            .export_markdown_impl(&ExportOptions::default())
            .unwrap();
        assert!(text.contains("- Visible"));
        assert!(!text.contains("- Hidden"));

        let text = store
            .export_markdown_impl(&ExportOptions {
                include_archived: true,
                ..Default::default()
            })
            .unwrap();
        assert!(text.contains("- Hidden"));
    }

    #[test]
    fn round_trip_preserves_task_content() {
        let store = test_store();
        let due = "2024-06-15T00:00:00Z".parse().unwrap();
        store
            .add_task_impl(
                &NewTask {
                    description: "Line 1\nLine 2".into(),
                    labels: vec!["bug".into(), "urgent".into()],
                    due_date: Some(due),
                    ..NewTask::new("Task with emoji 🎉 and pipe |")
                },
                "user",
            )
            .unwrap();

        let text = store
            .export_markdown_impl(&ExportOptions {
                include_metadata: true,
                include_archived: false,
            })
            .unwrap();

        // Import into a fresh database.
        let other = SqliteStore::open_in_memory().unwrap();
        let report = other.import_markdown_impl(&text, "user").unwrap();
        assert_eq!(report.tasks_created, 1);
        assert!(report.errors.is_empty());

        let imported = other.resolve_task_impl("#1").unwrap();
        assert_eq!(imported.title, "Task with emoji 🎉 and pipe |");
        assert_eq!(imported.labels, vec!["bug", "urgent"]);
        assert_eq!(imported.description, "Line 1\nLine 2");
        assert_eq!(imported.due_date, Some(due));

        let board = other.get_board_impl().unwrap();
        assert_eq!(board.name, "Test Board");
    }

    #[test]
    fn import_skips_known_ids() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("Known"), "user").unwrap();
        let text = store
            .export_markdown_impl(&ExportOptions {
                include_metadata: true,
                include_archived: false,
            })
            .unwrap();

        let report = store.import_markdown_impl(&text, "user").unwrap();
        assert_eq!(report.tasks_created, 0);
        assert_eq!(report.tasks_skipped, 1);
    }

    #[test]
    fn import_creates_missing_columns() {
        let store = test_store();
        let text = "# Test Board\n\n## Icebox\n\n- Frozen task\n";
        let report = store.import_markdown_impl(text, "user").unwrap();
        assert_eq!(report.columns_created, 1);
        assert_eq!(report.tasks_created, 1);

        let column = store.get_column_impl("icebox").unwrap();
        assert_eq!(column.name, "Icebox");
        let task = store.resolve_task_impl("#1").unwrap();
        assert_eq!(task.column_id, "icebox");
    }

    #[test]
    fn import_carries_parse_errors_through() {
        let store = test_store();
        let text = "# Test Board\n\n## To Do\n\n- Task\n    @ someday\n";
        let report = store.import_markdown_impl(text, "user").unwrap();
        assert_eq!(report.tasks_created, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("invalid date"));
    }

    #[test]
    fn completed_import_is_stamped() {
        let store = test_store();
        let text = "# Test Board\n\n## Done\n\n- Finished\n    @ ✓\n";
        store.import_markdown_impl(text, "user").unwrap();
        let task = store.resolve_task_impl("#1").unwrap();
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn update_then_export_round_trips_description() {
        let store = test_store();
        store.add_task_impl(&NewTask::new("T"), "user").unwrap();
        store
            .update_task_impl(
                "#1",
                &TaskUpdates {
                    description: Some("with\nthree\nlines".into()),
                    ..Default::default()
                },
                "user",
            )
            .unwrap();
        let text = store
            .export_markdown_impl(&ExportOptions::default())
            .unwrap();
        assert!(text.contains("    > with\n    > three\n    > lines\n"));
    }
}
