//! Ordered schema migrations for the SQLite store.
//!
//! Each migration is a `(name, sql)` pair named `NNNN_<tag>`. Scripts are
//! split on the [`STATEMENT_BREAK`] marker (plain `;` cannot be used because
//! trigger bodies contain semicolons), executed statement by statement, and
//! recorded in `__migrations` inside the same transaction. Re-running is a
//! no-op; every statement is idempotent via `IF NOT EXISTS`.
//!
//! Timestamps are stored as ISO 8601 TEXT (SQLite has no native datetime
//! type). Booleans are INTEGER 0/1. Label and file lists are JSON TEXT.

/// Marker separating statements inside one migration script.
pub const STATEMENT_BREAK: &str = "--> statement-breakpoint";

/// Splits a migration script into its individual statements.
pub fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(STATEMENT_BREAK)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// All migrations, in application order.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init", INIT_SQL),
    ("0002_audit_log", AUDIT_LOG_SQL),
    ("0003_audit_triggers", AUDIT_TRIGGERS_SQL),
    ("0004_audit_actor_index", AUDIT_ACTOR_INDEX_SQL),
];

// ---------------------------------------------------------------------------
// 0001_init -- boards, columns, tasks, task_links
// ---------------------------------------------------------------------------

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS boards (
    id                TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    scorer            TEXT NOT NULL DEFAULT 'combined',
    max_board_task_id INTEGER NOT NULL DEFAULT 0,
    created_by        TEXT DEFAULT '',
    updated_by        TEXT DEFAULT '',
    created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
--> statement-breakpoint
CREATE TABLE IF NOT EXISTS columns (
    id          TEXT PRIMARY KEY,
    board_id    TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    position    INTEGER NOT NULL,
    wip_limit   INTEGER,
    is_terminal INTEGER NOT NULL DEFAULT 0,
    created_by  TEXT DEFAULT '',
    updated_by  TEXT DEFAULT '',
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (board_id, position)
)
--> statement-breakpoint
CREATE TABLE IF NOT EXISTS tasks (
    id             TEXT PRIMARY KEY,
    board_id       TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    board_task_id  INTEGER NOT NULL,
    column_id      TEXT NOT NULL REFERENCES columns(id),
    title          TEXT NOT NULL,
    description    TEXT NOT NULL DEFAULT '',
    position       INTEGER NOT NULL DEFAULT 0,
    created_by     TEXT DEFAULT '',
    assigned_to    TEXT,
    parent_id      TEXT REFERENCES tasks(id) ON DELETE SET NULL,
    labels         TEXT NOT NULL DEFAULT '[]',
    files          TEXT NOT NULL DEFAULT '[]',
    blocked_reason TEXT,
    version        INTEGER NOT NULL DEFAULT 1,
    due_date       TEXT,
    started_at     TEXT,
    completed_at   TEXT,
    archived       INTEGER NOT NULL DEFAULT 0,
    archived_at    TEXT,
    updated_by     TEXT DEFAULT '',
    created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_board_short_id ON tasks(board_id, board_task_id)
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_column_position ON tasks(column_id, position)
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id)
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_tasks_assigned ON tasks(assigned_to)
--> statement-breakpoint
CREATE TABLE IF NOT EXISTS task_links (
    from_task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    to_task_id   TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    link_type    TEXT NOT NULL,
    created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (from_task_id, to_task_id, link_type)
)
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_task_links_to ON task_links(to_task_id)
"#;

// ---------------------------------------------------------------------------
// 0002_audit_log
// ---------------------------------------------------------------------------

const AUDIT_LOG_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    event_type  TEXT NOT NULL,
    object_type TEXT NOT NULL,
    object_id   TEXT NOT NULL,
    field_name  TEXT,
    old_value   TEXT,
    new_value   TEXT,
    actor       TEXT
)
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_audit_object ON audit_log(object_type, object_id)
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp)
"#;

// ---------------------------------------------------------------------------
// 0003_audit_triggers
//
// The audit log is populated here, not in application code, so a failed
// statement rolls back together with its audit rows. UPDATE triggers fire
// once per changed whitelisted field; `IS NOT` gives null-safe comparison
// so NULL<->value transitions are detected. Field names use the camelCase
// API spelling. Empty-string actors are stored as NULL.
// ---------------------------------------------------------------------------

const AUDIT_TRIGGERS_SQL: &str = r#"
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_insert
AFTER INSERT ON tasks
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, new_value, actor)
    VALUES ('CREATE', 'task', NEW.id,
            json_object('title', NEW.title, 'columnId', NEW.column_id, 'shortId', NEW.board_task_id),
            NULLIF(NEW.created_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_update_title
AFTER UPDATE OF title ON tasks
WHEN NEW.title IS NOT OLD.title
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'task', NEW.id, 'title', OLD.title, NEW.title, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_update_column
AFTER UPDATE OF column_id ON tasks
WHEN NEW.column_id IS NOT OLD.column_id
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'task', NEW.id, 'columnId', OLD.column_id, NEW.column_id, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_update_assigned
AFTER UPDATE OF assigned_to ON tasks
WHEN NEW.assigned_to IS NOT OLD.assigned_to
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'task', NEW.id, 'assignedTo', OLD.assigned_to, NEW.assigned_to, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_update_description
AFTER UPDATE OF description ON tasks
WHEN NEW.description IS NOT OLD.description
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'task', NEW.id, 'description', OLD.description, NEW.description, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_update_archived
AFTER UPDATE OF archived ON tasks
WHEN NEW.archived IS NOT OLD.archived
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'task', NEW.id, 'archived', OLD.archived, NEW.archived, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_update_labels
AFTER UPDATE OF labels ON tasks
WHEN NEW.labels IS NOT OLD.labels
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'task', NEW.id, 'labels', OLD.labels, NEW.labels, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_tasks_audit_delete
AFTER DELETE ON tasks
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, old_value, actor)
    VALUES ('DELETE', 'task', OLD.id,
            json_object('title', OLD.title, 'columnId', OLD.column_id, 'shortId', OLD.board_task_id,
                        'assignedTo', OLD.assigned_to, 'labels', OLD.labels, 'archived', OLD.archived),
            NULLIF(OLD.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_columns_audit_insert
AFTER INSERT ON columns
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, new_value, actor)
    VALUES ('CREATE', 'column', NEW.id, json_object('name', NEW.name), NULLIF(NEW.created_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_columns_audit_update_name
AFTER UPDATE OF name ON columns
WHEN NEW.name IS NOT OLD.name
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'column', NEW.id, 'name', OLD.name, NEW.name, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_columns_audit_update_position
AFTER UPDATE OF position ON columns
WHEN NEW.position IS NOT OLD.position
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'column', NEW.id, 'position', OLD.position, NEW.position, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_columns_audit_update_wip_limit
AFTER UPDATE OF wip_limit ON columns
WHEN NEW.wip_limit IS NOT OLD.wip_limit
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'column', NEW.id, 'wipLimit', OLD.wip_limit, NEW.wip_limit, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_columns_audit_delete
AFTER DELETE ON columns
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, old_value, actor)
    VALUES ('DELETE', 'column', OLD.id, json_object('name', OLD.name), NULLIF(OLD.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_boards_audit_insert
AFTER INSERT ON boards
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, new_value, actor)
    VALUES ('CREATE', 'board', NEW.id, json_object('name', NEW.name), NULLIF(NEW.created_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_boards_audit_update_name
AFTER UPDATE OF name ON boards
WHEN NEW.name IS NOT OLD.name
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, field_name, old_value, new_value, actor)
    VALUES ('UPDATE', 'board', NEW.id, 'name', OLD.name, NEW.name, NULLIF(NEW.updated_by, ''));
END
--> statement-breakpoint
CREATE TRIGGER IF NOT EXISTS trg_boards_audit_delete
AFTER DELETE ON boards
BEGIN
    INSERT INTO audit_log (event_type, object_type, object_id, old_value, actor)
    VALUES ('DELETE', 'board', OLD.id, json_object('name', OLD.name), NULLIF(OLD.updated_by, ''));
END
"#;

// ---------------------------------------------------------------------------
// 0004_audit_actor_index -- actor filtering at scale
// ---------------------------------------------------------------------------

const AUDIT_ACTOR_INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_log(actor)
"#;
