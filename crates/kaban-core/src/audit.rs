//! Audit types -- the trigger-populated change history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// Kind of object an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Task,
    Column,
    Board,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Column => "column",
            Self::Board => "board",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "column" => Ok(Self::Column),
            "board" => Ok(Self::Board),
            other => Err(format!("unknown object type: {other}")),
        }
    }
}

/// One append-only row of the audit log.
///
/// Rows are written by database triggers inside the transaction of the
/// mutating statement; the application never inserts them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Autoincrement id; strictly increasing across committed transactions.
    pub id: i64,

    pub timestamp: DateTime<Utc>,

    pub event_type: EventType,

    pub object_type: ObjectType,

    pub object_id: String,

    /// Which field changed, for UPDATE entries. CamelCase API names
    /// (`columnId`, `assignedTo`, `wipLimit`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,

    /// Actor string captured from `updated_by`/`created_by`; absent rows are
    /// surfaced as "unknown" by front-ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// Filter for audit history queries. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub object_type: Option<ObjectType>,
    pub object_id: Option<String>,
    pub event_type: Option<EventType>,
    pub actor: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Page size; capped at [`AuditFilter::MAX_LIMIT`].
    pub limit: Option<u32>,
    pub offset: u32,
}

impl AuditFilter {
    /// Hard cap on page size.
    pub const MAX_LIMIT: u32 = 1000;

    /// Default page size when none is requested.
    pub const DEFAULT_LIMIT: u32 = 100;

    /// The effective page size after defaulting and capping.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT)
    }
}

/// One page of audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    /// Entries ordered timestamp descending.
    pub entries: Vec<AuditEntry>,
    /// Total rows matching the filter, ignoring pagination.
    pub total: u64,
    /// Whether another page exists past this one.
    pub has_more: bool,
}

/// Aggregate statistics over the audit log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_entries: u64,
    /// Counts keyed by event type name (`CREATE`, `UPDATE`, `DELETE`).
    pub by_event: BTreeMap<String, u64>,
    /// Counts keyed by object type name (`task`, `column`, `board`).
    pub by_object: BTreeMap<String, u64>,
    /// The 10 most recently active distinct actors, newest first.
    pub recent_actors: Vec<String>,
}
