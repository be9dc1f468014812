//! Task scoring framework for the kaban board engine.
//!
//! A [`Scorer`] is a named, pure, deterministic function from a task to a
//! non-negative urgency score. The [`ScoringService`] keeps an ordered
//! registry of scorers and ranks task sets. External lookups (such as how
//! many open tasks a task blocks) are injected as functions at construction
//! so the scorers themselves stay pure.

pub mod builtin;
pub mod scorer;
pub mod service;

pub use builtin::{
    BlockingCountFn, BlockingScorer, CombinedScorer, CombinedWeights, DueDateScorer, FifoScorer,
    PriorityScorer,
};
pub use scorer::{ScoreBreakdown, ScoredTask, Scorer};
pub use service::ScoringService;
