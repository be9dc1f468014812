//! Filter types for task queries.

/// Filter for `list_tasks`. All set fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to one column.
    pub column_id: Option<String>,

    /// Restrict to tasks assigned to this agent.
    pub assigned_to: Option<String>,

    /// `Some(true)` keeps only tasks with open blockers, `Some(false)` only
    /// unblocked tasks.
    pub blocked: Option<bool>,

    /// Archived tasks are invisible unless this is set.
    pub include_archived: bool,
}

impl TaskFilter {
    /// Filter for one column, excluding archived tasks.
    pub fn in_column(column_id: impl Into<String>) -> Self {
        Self {
            column_id: Some(column_id.into()),
            ..Self::default()
        }
    }
}
