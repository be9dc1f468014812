//! The [`Scorer`] trait and scored-task result types.

use chrono::{DateTime, Utc};
use kaban_core::Task;
use serde::{Deserialize, Serialize};

/// A named, pure scoring function. Higher scores mean more urgent.
///
/// Determinism contract: for a fixed `now` and an identical task, `score`
/// must return the same value on every call. Anything stateful (database
/// lookups, counters) is injected at construction time, never read inside
/// `score`.
pub trait Scorer: Send + Sync {
    /// Registry key; unique among active scorers.
    fn name(&self) -> &str;

    /// Human-readable summary for `kaban scorer list`-style surfaces.
    fn description(&self) -> &str;

    /// Optional unit label (e.g. "days").
    fn units(&self) -> Option<&str> {
        None
    }

    /// Scores a task against the given instant. Must be non-negative.
    fn score(&self, task: &Task, now: DateTime<Utc>) -> f64;
}

/// One scorer's contribution to a task's total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub name: String,
    pub score: f64,
}

/// A task together with its total score and per-scorer breakdown, in
/// scorer insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTask {
    pub task: Task,
    pub total: f64,
    pub breakdown: Vec<ScoreBreakdown>,
}
