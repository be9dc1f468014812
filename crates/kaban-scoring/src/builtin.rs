//! Built-in scorers: fifo, priority, due-date, blocking, combined.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kaban_core::Task;

use crate::scorer::Scorer;

/// Injected lookup for how many open tasks a task currently blocks.
///
/// Supplied by the dependency service; the scorer never touches the
/// database itself.
pub type BlockingCountFn = Arc<dyn Fn(&Task) -> usize + Send + Sync>;

const SECONDS_PER_DAY: f64 = 86_400.0;

// ---------------------------------------------------------------------------
// fifo
// ---------------------------------------------------------------------------

/// Age-based scorer: `(now − createdAt)` in days. Prevents starvation.
#[derive(Debug, Default)]
pub struct FifoScorer;

impl Scorer for FifoScorer {
    fn name(&self) -> &str {
        "fifo"
    }

    fn description(&self) -> &str {
        "Older tasks score higher (age in days)"
    }

    fn units(&self) -> Option<&str> {
        Some("days")
    }

    fn score(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        let age = (now - task.created_at).num_seconds() as f64 / SECONDS_PER_DAY;
        age.max(0.0)
    }
}

// ---------------------------------------------------------------------------
// priority
// ---------------------------------------------------------------------------

/// Fixed weight table matched case-insensitively against labels.
const PRIORITY_WEIGHTS: &[(&str, f64)] = &[
    ("critical", 1000.0),
    ("p0", 1000.0),
    ("urgent", 500.0),
    ("p1", 500.0),
    ("high", 100.0),
    ("p2", 100.0),
    ("medium", 50.0),
    ("p3", 50.0),
    ("low", 10.0),
    ("p4", 10.0),
];

/// Label-driven priority scorer. Untagged tasks score 0.
#[derive(Debug, Default)]
pub struct PriorityScorer;

impl Scorer for PriorityScorer {
    fn name(&self) -> &str {
        "priority"
    }

    fn description(&self) -> &str {
        "Priority labels (critical/p0 .. low/p4) map to fixed weights"
    }

    fn score(&self, task: &Task, _now: DateTime<Utc>) -> f64 {
        task.labels
            .iter()
            .filter_map(|label| {
                let lower = label.to_lowercase();
                PRIORITY_WEIGHTS
                    .iter()
                    .find(|(name, _)| *name == lower)
                    .map(|(_, weight)| *weight)
            })
            .fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// due-date
// ---------------------------------------------------------------------------

/// Deadline pressure scorer.
///
/// Overdue: `1000 + daysOverdue · 10`. Due within a day: 500. Due within a
/// week: `100 + (7 − d) · 10`. Further out: `max(0, 50 − d)`. No due date: 0.
#[derive(Debug, Default)]
pub struct DueDateScorer;

impl Scorer for DueDateScorer {
    fn name(&self) -> &str {
        "due-date"
    }

    fn description(&self) -> &str {
        "Overdue and imminent due dates score higher"
    }

    fn score(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        let Some(due) = task.due_date else {
            return 0.0;
        };
        if due < now {
            let days_overdue = (now - due).num_days() as f64;
            return 1000.0 + days_overdue * 10.0;
        }
        let days_left = (due - now).num_days() as f64;
        if days_left <= 1.0 {
            500.0
        } else if days_left <= 7.0 {
            100.0 + (7.0 - days_left) * 10.0
        } else {
            (50.0 - days_left).max(0.0)
        }
    }
}

// ---------------------------------------------------------------------------
// blocking
// ---------------------------------------------------------------------------

/// Bottleneck scorer: `blockingCount · 50`.
pub struct BlockingScorer {
    blocking_count: BlockingCountFn,
}

impl BlockingScorer {
    pub fn new(blocking_count: BlockingCountFn) -> Self {
        Self { blocking_count }
    }
}

impl Scorer for BlockingScorer {
    fn name(&self) -> &str {
        "blocking"
    }

    fn description(&self) -> &str {
        "Tasks that block others score higher"
    }

    fn score(&self, task: &Task, _now: DateTime<Utc>) -> f64 {
        (self.blocking_count)(task) as f64 * 50.0
    }
}

impl std::fmt::Debug for BlockingScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingScorer").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// combined
// ---------------------------------------------------------------------------

/// Weight vector for [`CombinedScorer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedWeights {
    pub priority: f64,
    pub due_date: f64,
    pub fifo: f64,
    /// Zero disables the blocking component entirely.
    pub blocking: f64,
}

impl Default for CombinedWeights {
    fn default() -> Self {
        Self {
            priority: 0.5,
            due_date: 0.3,
            fifo: 0.2,
            blocking: 0.0,
        }
    }
}

/// The board-level default: a weighted sum of the other built-ins.
pub struct CombinedScorer {
    weights: CombinedWeights,
    priority: PriorityScorer,
    due_date: DueDateScorer,
    fifo: FifoScorer,
    blocking: Option<BlockingScorer>,
}

impl CombinedScorer {
    pub fn new(weights: CombinedWeights, blocking_count: Option<BlockingCountFn>) -> Self {
        Self {
            weights,
            priority: PriorityScorer,
            due_date: DueDateScorer,
            fifo: FifoScorer,
            blocking: blocking_count.map(BlockingScorer::new),
        }
    }
}

impl Default for CombinedScorer {
    fn default() -> Self {
        Self::new(CombinedWeights::default(), None)
    }
}

impl Scorer for CombinedScorer {
    fn name(&self) -> &str {
        "combined"
    }

    fn description(&self) -> &str {
        "Weighted sum of priority, due-date, fifo and (optionally) blocking"
    }

    fn score(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        let mut total = self.weights.priority * self.priority.score(task, now)
            + self.weights.due_date * self.due_date.score(task, now)
            + self.weights.fifo * self.fifo.score(task, now);
        if let Some(ref blocking) = self.blocking {
            total += self.weights.blocking * blocking.score(task, now);
        }
        total
    }
}

impl std::fmt::Debug for CombinedScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedScorer")
            .field("weights", &self.weights)
            .finish_non_exhaustive()
    }
}
