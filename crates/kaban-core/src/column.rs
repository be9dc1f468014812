//! Column -- an ordered bucket of tasks within a board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow stage within a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Stable slug id (`todo`, `in_progress`, ...), unique across the database.
    pub id: String,

    pub board_id: String,

    pub name: String,

    /// Ordering within the board. Unique per board, dense not required.
    pub position: i64,

    /// Maximum number of non-archived tasks allowed at once, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,

    /// Completing moves into this column stamp `completed_at`.
    #[serde(default)]
    pub is_terminal: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Column {
    /// Returns `true` if adding one more task would exceed the WIP limit,
    /// given the current count of non-archived tasks in the column.
    pub fn at_wip_limit(&self, current_count: u32) -> bool {
        match self.wip_limit {
            Some(limit) => current_count >= limit,
            None => false,
        }
    }
}
