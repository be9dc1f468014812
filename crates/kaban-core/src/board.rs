//! Board -- the top-level container of columns and tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level container for one project.
///
/// Exactly one board is expected per database in v1, but every relationship
/// in the schema is board-scoped so multi-board needs no migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,

    pub name: String,

    /// Name of the active scorer for `kaban next`-style ranking.
    pub scorer: String,

    /// High-water mark for per-board short ids. Monotonically non-decreasing;
    /// deleting a task never lowers it, so short ids are never reused.
    pub max_board_task_id: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Declarative description of a column used by board initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Stable slug id, e.g. `in_progress`.
    pub id: String,

    /// Display name, e.g. `In Progress`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,

    /// Tasks entering a terminal column are stamped `completed_at`.
    #[serde(default)]
    pub terminal: bool,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            wip_limit: None,
            terminal: false,
        }
    }

    pub fn with_wip_limit(mut self, limit: u32) -> Self {
        self.wip_limit = Some(limit);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Configuration handed to `initialize_board`.
///
/// The board service bakes in no defaults of its own; callers pass either a
/// config of their making or [`BoardConfig::standard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,

    /// Scorer active after initialisation.
    #[serde(default = "default_scorer")]
    pub scorer: String,

    pub columns: Vec<ColumnSpec>,
}

fn default_scorer() -> String {
    "combined".to_string()
}

impl BoardConfig {
    /// The canonical five-column board: backlog, todo, in_progress (WIP 3),
    /// review (WIP 2), done (terminal).
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scorer: default_scorer(),
            columns: vec![
                ColumnSpec::new("backlog", "Backlog"),
                ColumnSpec::new("todo", "To Do"),
                ColumnSpec::new("in_progress", "In Progress").with_wip_limit(3),
                ColumnSpec::new("review", "Review").with_wip_limit(2),
                ColumnSpec::new("done", "Done").terminal(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_columns() {
        let config = BoardConfig::standard("Test Board");
        let ids: Vec<&str> = config.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["backlog", "todo", "in_progress", "review", "done"]);

        let in_progress = &config.columns[2];
        assert_eq!(in_progress.wip_limit, Some(3));
        assert!(!in_progress.terminal);

        let done = &config.columns[4];
        assert!(done.terminal);
        assert_eq!(done.wip_limit, None);
    }

    #[test]
    fn standard_config_default_scorer() {
        let config = BoardConfig::standard("B");
        assert_eq!(config.scorer, "combined");
    }
}
