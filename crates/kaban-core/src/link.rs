//! Task links -- directed edges between tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a directed link between two tasks.
///
/// `blocks(A, B)` and `blocked_by(B, A)` are maintained as a mirror pair;
/// `related` is stored in both directions so lookup is symmetric from either
/// endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Blocks,
    BlockedBy,
    Related,
}

impl LinkType {
    /// Returns the string representation stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::BlockedBy => "blocked_by",
            Self::Related => "related",
        }
    }

    /// The type of the reverse edge that keeps the graph symmetric.
    pub fn mirror(self) -> Self {
        match self {
            Self::Blocks => Self::BlockedBy,
            Self::BlockedBy => Self::Blocks,
            Self::Related => Self::Related,
        }
    }

    /// Returns `true` for the types that participate in blocking semantics
    /// and therefore in cycle detection. `related` carries no ordering.
    pub fn affects_blocking(self) -> bool {
        !matches!(self, Self::Related)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocks" => Ok(Self::Blocks),
            "blocked_by" => Ok(Self::BlockedBy),
            "related" => Ok(Self::Related),
            other => Err(format!("unknown link type: {other}")),
        }
    }
}

/// A directed edge `(from, to, type)` in the link graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLink {
    pub from_task_id: String,
    pub to_task_id: String,
    pub link_type: LinkType,
    pub created_at: DateTime<Utc>,
}

/// All links of one task, grouped by direction as seen from that task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLinks {
    /// Ids of tasks this task blocks.
    pub blocks: Vec<String>,
    /// Ids of tasks this task is blocked by.
    pub blocked_by: Vec<String>,
    /// Ids of related tasks.
    pub related: Vec<String>,
}

impl TaskLinks {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.blocked_by.is_empty() && self.related.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_pairs() {
        assert_eq!(LinkType::Blocks.mirror(), LinkType::BlockedBy);
        assert_eq!(LinkType::BlockedBy.mirror(), LinkType::Blocks);
        assert_eq!(LinkType::Related.mirror(), LinkType::Related);
    }

    #[test]
    fn blocking_semantics() {
        assert!(LinkType::Blocks.affects_blocking());
        assert!(LinkType::BlockedBy.affects_blocking());
        assert!(!LinkType::Related.affects_blocking());
    }

    #[test]
    fn parse_round_trip() {
        for lt in [LinkType::Blocks, LinkType::BlockedBy, LinkType::Related] {
            assert_eq!(lt.as_str().parse::<LinkType>().unwrap(), lt);
        }
        assert!("parent".parse::<LinkType>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&LinkType::BlockedBy).unwrap();
        assert_eq!(json, r#""blocked_by""#);
    }
}
