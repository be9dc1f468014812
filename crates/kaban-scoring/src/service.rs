//! The [`ScoringService`] -- ordered scorer registry and task ranking.

use chrono::{DateTime, Utc};
use kaban_core::Task;

use crate::builtin::{
    BlockingCountFn, BlockingScorer, CombinedScorer, CombinedWeights, DueDateScorer, FifoScorer,
    PriorityScorer,
};
use crate::scorer::{ScoreBreakdown, ScoredTask, Scorer};

/// Holds the ordered set of active scorers.
///
/// The registry is immutable after boot except through explicit
/// [`add_scorer`](Self::add_scorer) / [`remove_scorer`](Self::remove_scorer)
/// calls. Evaluation walks scorers in insertion order.
#[derive(Default)]
pub struct ScoringService {
    scorers: Vec<Box<dyn Scorer>>,
}

impl ScoringService {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with all five built-ins installed, in the canonical order.
    pub fn with_defaults(blocking_count: BlockingCountFn) -> Self {
        let mut service = Self::new();
        service.add_scorer(Box::new(FifoScorer));
        service.add_scorer(Box::new(PriorityScorer));
        service.add_scorer(Box::new(DueDateScorer));
        service.add_scorer(Box::new(BlockingScorer::new(blocking_count.clone())));
        service.add_scorer(Box::new(CombinedScorer::new(
            CombinedWeights::default(),
            Some(blocking_count),
        )));
        service
    }

    /// Registers a scorer. An existing scorer with the same name is replaced
    /// in place, keeping its position in the evaluation order.
    pub fn add_scorer(&mut self, scorer: Box<dyn Scorer>) {
        match self.scorers.iter().position(|s| s.name() == scorer.name()) {
            Some(idx) => self.scorers[idx] = scorer,
            None => self.scorers.push(scorer),
        }
    }

    /// Removes a scorer by name. Returns `true` if it was present.
    pub fn remove_scorer(&mut self, name: &str) -> bool {
        let before = self.scorers.len();
        self.scorers.retain(|s| s.name() != name);
        self.scorers.len() < before
    }

    /// Looks up a scorer by name.
    pub fn scorer(&self, name: &str) -> Option<&dyn Scorer> {
        self.scorers
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    /// Names of the active scorers in evaluation order.
    pub fn scorer_names(&self) -> Vec<&str> {
        self.scorers.iter().map(|s| s.name()).collect()
    }

    /// Evaluates every active scorer against one task, in insertion order,
    /// and sums the contributions.
    pub fn score_task(&self, task: &Task, now: DateTime<Utc>) -> ScoredTask {
        let breakdown: Vec<ScoreBreakdown> = self
            .scorers
            .iter()
            .map(|s| ScoreBreakdown {
                name: s.name().to_string(),
                score: s.score(task, now),
            })
            .collect();
        let total = breakdown.iter().map(|b| b.score).sum();
        ScoredTask {
            task: task.clone(),
            total,
            breakdown,
        }
    }

    /// Ranks tasks by total score descending. Stable on ties, so equal
    /// totals keep their input order.
    pub fn rank_tasks(&self, tasks: &[Task], now: DateTime<Utc>) -> Vec<ScoredTask> {
        let mut scored: Vec<ScoredTask> = tasks.iter().map(|t| self.score_task(t, now)).collect();
        scored.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// Ranks tasks using a single named scorer instead of the full set.
    pub fn rank_tasks_with(
        &self,
        name: &str,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> Option<Vec<ScoredTask>> {
        let scorer = self.scorer(name)?;
        let mut scored: Vec<ScoredTask> = tasks
            .iter()
            .map(|t| {
                let score = scorer.score(t, now);
                ScoredTask {
                    task: t.clone(),
                    total: score,
                    breakdown: vec![ScoreBreakdown {
                        name: name.to_string(),
                        score,
                    }],
                }
            })
            .collect();
        scored.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
        Some(scored)
    }
}

impl std::fmt::Debug for ScoringService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringService")
            .field("scorers", &self.scorer_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn fixed_now() -> DateTime<Utc> {
        "2024-06-12T00:00:00Z".parse().unwrap()
    }

    fn task(id: i64, created: DateTime<Utc>) -> Task {
        Task {
            id: format!("01ARZ3NDEKTSV4RRFFQ69G5F{id:02}"),
            board_id: "b".into(),
            board_task_id: id,
            column_id: "todo".into(),
            position: id,
            title: format!("Task {id}"),
            description: String::new(),
            labels: Vec::new(),
            files: Vec::new(),
            parent_id: None,
            blocked_reason: None,
            created_by: "user".into(),
            assigned_to: None,
            updated_by: String::new(),
            version: 1,
            due_date: None,
            started_at: None,
            completed_at: None,
            archived: false,
            archived_at: None,
            created_at: created,
            updated_at: created,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn defaults_install_all_builtins() {
        let service = ScoringService::with_defaults(Arc::new(|_| 0));
        assert_eq!(
            service.scorer_names(),
            vec!["fifo", "priority", "due-date", "blocking", "combined"]
        );
    }

    #[test]
    fn add_replaces_by_name_in_place() {
        let mut service = ScoringService::new();
        service.add_scorer(Box::new(FifoScorer));
        service.add_scorer(Box::new(PriorityScorer));
        // Re-adding fifo must not move it to the end.
        service.add_scorer(Box::new(FifoScorer));
        assert_eq!(service.scorer_names(), vec!["fifo", "priority"]);
    }

    #[test]
    fn remove_scorer() {
        let mut service = ScoringService::with_defaults(Arc::new(|_| 0));
        assert!(service.remove_scorer("blocking"));
        assert!(!service.remove_scorer("blocking"));
        assert!(service.scorer("blocking").is_none());
    }

    #[test]
    fn score_task_sums_breakdown_in_order() {
        let now = fixed_now();
        let mut service = ScoringService::new();
        service.add_scorer(Box::new(FifoScorer));
        service.add_scorer(Box::new(PriorityScorer));

        let mut t = task(1, now - Duration::days(2));
        t.labels = vec!["high".into()];

        let scored = service.score_task(&t, now);
        let names: Vec<&str> = scored.breakdown.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["fifo", "priority"]);
        assert_eq!(scored.total, 2.0 + 100.0);
    }

    #[test]
    fn rank_is_descending_and_stable() {
        let now = fixed_now();
        let mut service = ScoringService::new();
        service.add_scorer(Box::new(PriorityScorer));

        let mut a = task(1, now);
        a.labels = vec!["low".into()];
        let mut b = task(2, now);
        b.labels = vec!["critical".into()];
        // c and d tie at zero; input order must be preserved.
        let c = task(3, now);
        let d = task(4, now);

        let ranked = service.rank_tasks(&[a, b, c, d], now);
        let ids: Vec<i64> = ranked.iter().map(|s| s.task.board_task_id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    #[test]
    fn rank_with_named_scorer() {
        let now = fixed_now();
        let service = ScoringService::with_defaults(Arc::new(|_| 0));

        let old = task(1, now - Duration::days(9));
        let new = task(2, now - Duration::days(1));

        let ranked = service.rank_tasks_with("fifo", &[new, old], now).unwrap();
        assert_eq!(ranked[0].task.board_task_id, 1);
        assert!(service.rank_tasks_with("nope", &[], now).is_none());
    }

    #[test]
    fn repeated_evaluation_is_stable() {
        let now = fixed_now();
        let service = ScoringService::with_defaults(Arc::new(|_| 1));
        let mut t = task(1, now - Duration::days(4));
        t.labels = vec!["urgent".into()];
        t.due_date = Some(now + Duration::days(2));

        let first = service.score_task(&t, now);
        for _ in 0..5 {
            let again = service.score_task(&t, now);
            assert_eq!(again.total, first.total);
            assert_eq!(again.breakdown, first.breakdown);
        }
    }
}
