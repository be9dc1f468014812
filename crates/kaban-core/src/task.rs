//! Task -- the central domain model of the board engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Helper for `skip_serializing_if` on `Vec` fields.
fn is_empty_vec<T>(v: &Vec<T>) -> bool {
    v.is_empty()
}

/// Helper for `skip_serializing_if` on `bool` fields.
fn is_false(b: &bool) -> bool {
    !b
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    // ===== Identification =====
    /// 26-char sortable global id (ULID), unique across the database.
    pub id: String,

    pub board_id: String,

    /// Per-board short id (`#N`). Positive, unique within the board, never
    /// reused after a delete.
    pub board_task_id: i64,

    // ===== Placement =====
    pub column_id: String,

    /// Ordering within the column. Unique per column at commit time; values
    /// may drift sparse, re-packing is never performed.
    pub position: i64,

    // ===== Content =====
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub files: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,

    // ===== Assignment =====
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by: String,

    // ===== Concurrency =====
    /// Monotonically incremented on every successful update; callers may pass
    /// it back as an optimistic-concurrency token.
    pub version: i64,

    // ===== Timestamps =====
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub archived: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    // ===== Derived =====
    /// Read-through view of the `blocked_by` link graph, populated at query
    /// time for backwards-compat consumers. Never written to the task row.
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub depends_on: Vec<String>,
}

impl Task {
    /// Returns `true` once the task has entered a terminal column.
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// The `#N` display form of the per-board short id.
    pub fn short_ref(&self) -> String {
        format!("#{}", self.board_task_id)
    }
}

/// Input for `add_task`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Destination column; the service defaults to `todo` when absent.
    #[serde(default)]
    pub column_id: Option<String>,

    #[serde(default)]
    pub assigned_to: Option<String>,

    /// Ids (full, short, or prefix) of tasks this one is blocked by.
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub parent_id: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Typed partial-update struct for tasks.
///
/// Only `Some` fields are applied. `Option<Option<T>>` fields distinguish
/// "leave unchanged" (outer `None`) from "clear" (inner `None`). The column
/// is deliberately absent: placement changes go through `move_task`, and
/// `board_task_id` is immutable for the life of the task.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdates {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
    pub files: Option<Vec<String>>,
    pub blocked_reason: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// Explicit completion override; moves manage this implicitly.
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub parent_id: Option<Option<String>>,
    /// Optimistic-concurrency token: when set, the update fails with a
    /// version conflict unless the stored version still matches.
    pub expected_version: Option<i64>,
}

impl TaskUpdates {
    /// Returns `true` if no field would be written.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.assigned_to.is_none()
            && self.labels.is_none()
            && self.files.is_none()
            && self.blocked_reason.is_none()
            && self.due_date.is_none()
            && self.completed_at.is_none()
            && self.parent_id.is_none()
    }
}
