//! End-to-end scenarios exercised through the public [`Storage`] contract.

use std::sync::Arc;

use kaban_core::audit::{AuditFilter, EventType, ObjectType};
use kaban_core::board::BoardConfig;
use kaban_core::filter::TaskFilter;
use kaban_core::task::{NewTask, TaskUpdates};
use kaban_storage::{ExportOptions, SqliteStore, Storage, StorageError};
use pretty_assertions::assert_eq;

fn new_board(name: &str) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .initialize_board(&BoardConfig::standard(name), "user")
        .unwrap();
    store
}

#[test]
fn scenario_a_init_and_add() {
    let store = new_board("Test Board");
    let task = store.add_task(&NewTask::new("Task 1"), "user").unwrap();

    assert_eq!(task.board_task_id, 1);
    assert_eq!(task.column_id, "todo");
    assert_eq!(task.position, 0);
    assert_eq!(task.version, 1);

    let history = store.get_task_history(&task.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, EventType::Create);
    assert_eq!(history[0].object_type, ObjectType::Task);
    assert_eq!(history[0].actor.as_deref(), Some("user"));
}

#[test]
fn scenario_b_move_and_complete() {
    let store = new_board("B");
    store.add_task(&NewTask::new("One"), "user").unwrap();
    store.add_task(&NewTask::new("Two"), "user").unwrap();

    let moved = store.move_task("#1", "in_progress", false, "user").unwrap();
    assert!(moved.started_at.is_some());

    let done = store.move_task("#1", "done", false, "user").unwrap();
    assert!(done.completed_at.is_some());

    let in_done = store
        .list_tasks(&TaskFilter::in_column("done"))
        .unwrap();
    let short_ids: Vec<i64> = in_done.iter().map(|t| t.board_task_id).collect();
    assert_eq!(short_ids, vec![1]);
}

#[test]
fn scenario_c_cycle_rejection() {
    let store = new_board("B");
    for title in ["One", "Two", "Three"] {
        store.add_task(&NewTask::new(title), "user").unwrap();
    }

    store.add_dependency("#1", "#2").unwrap();
    store.add_dependency("#2", "#3").unwrap();

    let err = store.add_dependency("#3", "#1").unwrap_err();
    assert_eq!(err.exit_code(), 6);
    match err {
        StorageError::Cycle { path } => {
            assert_eq!(path, vec!["#3", "#1", "#2", "#3"]);
        }
        other => panic!("expected Cycle, got {other:?}"),
    }
}

#[test]
fn scenario_d_wip_enforcement() {
    let store = new_board("B");
    for i in 1..=4 {
        store
            .add_task(&NewTask::new(format!("T{i}")), "user")
            .unwrap();
    }
    for i in 1..=3 {
        store
            .move_task(&format!("#{i}"), "in_progress", false, "user")
            .unwrap();
    }

    let err = store
        .move_task("#4", "in_progress", false, "user")
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(
        err.to_string()
            .contains("Column 'In Progress' at WIP limit (3/3)"),
        "unexpected message: {err}"
    );

    // --force succeeds and the move is still audited.
    let forced = store.move_task("#4", "in_progress", true, "user").unwrap();
    assert_eq!(forced.column_id, "in_progress");

    let history = store.get_task_history("#4").unwrap();
    let moved = history
        .iter()
        .find(|e| e.field_name.as_deref() == Some("columnId"))
        .expect("forced move must be audited");
    assert_eq!(moved.new_value.as_deref(), Some("in_progress"));
}

#[test]
fn scenario_e_archived_hidden() {
    let store = new_board("B");
    store.add_task(&NewTask::new("Keep"), "user").unwrap();
    store.add_task(&NewTask::new("Shelve"), "user").unwrap();

    store.archive_task("#1", "user").unwrap();

    let visible = store.list_tasks(&TaskFilter::default()).unwrap();
    assert!(visible.iter().all(|t| t.board_task_id != 1));

    let all = store
        .list_tasks(&TaskFilter {
            include_archived: true,
            ..Default::default()
        })
        .unwrap();
    assert!(all.iter().any(|t| t.board_task_id == 1));

    let text = store.export_markdown(&ExportOptions::default()).unwrap();
    assert!(!text.contains("- Keep"));
    assert!(text.contains("- Shelve"));

    let with_archived = store
        .export_markdown(&ExportOptions {
            include_archived: true,
            ..Default::default()
        })
        .unwrap();
    assert!(with_archived.contains("- Keep"));
}

#[test]
fn scenario_f_markdown_round_trip() {
    let store = new_board("Export Board");
    let due = "2024-06-15T00:00:00Z".parse().unwrap();
    store
        .add_task(
            &NewTask {
                description: "Line 1\nLine 2".into(),
                labels: vec!["bug".into(), "urgent".into()],
                due_date: Some(due),
                ..NewTask::new("Task with emoji 🎉 and pipe |")
            },
            "user",
        )
        .unwrap();

    let text = store
        .export_markdown(&ExportOptions {
            include_metadata: true,
            include_archived: false,
        })
        .unwrap();

    let fresh = SqliteStore::open_in_memory().unwrap();
    let report = fresh.import_markdown(&text, "user").unwrap();
    assert_eq!(report.tasks_created, 1);
    assert!(report.errors.is_empty());

    let task = fresh.resolve_task("#1").unwrap();
    assert_eq!(task.title, "Task with emoji 🎉 and pipe |");
    assert_eq!(task.labels, vec!["bug", "urgent"]);
    assert_eq!(task.description, "Line 1\nLine 2");
    assert_eq!(task.due_date, Some(due));
}

#[test]
fn scenario_g_audit_query() {
    let store = new_board("B");
    let task = store.add_task(&NewTask::new("Original"), "user").unwrap();
    store
        .update_task(
            "#1",
            &TaskUpdates {
                title: Some("Renamed".into()),
                ..Default::default()
            },
            "user",
        )
        .unwrap();
    store.move_task("#1", "in_progress", false, "user").unwrap();
    store.delete_task("#1", "user").unwrap();

    let history = store.get_task_history(&task.id).unwrap();
    let shape: Vec<(EventType, Option<&str>)> = history
        .iter()
        .map(|e| (e.event_type, e.field_name.as_deref()))
        .collect();
    assert_eq!(
        shape,
        vec![
            (EventType::Create, None),
            (EventType::Update, Some("title")),
            (EventType::Update, Some("columnId")),
            (EventType::Delete, None),
        ]
    );

    assert_eq!(history[1].old_value.as_deref(), Some("Original"));
    assert_eq!(history[1].new_value.as_deref(), Some("Renamed"));
    assert_eq!(history[2].old_value.as_deref(), Some("todo"));
    assert_eq!(history[2].new_value.as_deref(), Some("in_progress"));
    assert!(history[3].old_value.as_deref().unwrap().contains("Renamed"));
}

#[test]
fn versions_strictly_increase_across_operations() {
    let store = new_board("B");
    let v1 = store.add_task(&NewTask::new("T"), "user").unwrap();
    let v2 = store
        .update_task(
            "#1",
            &TaskUpdates {
                description: Some("desc".into()),
                ..Default::default()
            },
            "user",
        )
        .unwrap();
    let v3 = store.move_task("#1", "review", false, "user").unwrap();
    let v4 = store.archive_task("#1", "user").unwrap();
    let v5 = store.restore_task("#1", "user").unwrap();

    let versions = [v1.version, v2.version, v3.version, v4.version, v5.version];
    assert_eq!(versions, [1, 2, 3, 4, 5]);
}

#[test]
fn concurrent_adds_allocate_dense_short_ids() {
    let store = Arc::new(new_board("B"));
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            store
                .add_task(&NewTask::new(format!("Worker {i}")), "user")
                .unwrap()
                .board_task_id
        }));
    }
    let mut ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, (1..=8).collect::<Vec<i64>>());
}

#[test]
fn two_handles_on_one_file_allocate_disjoint_short_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".kaban").join("board.db");

    let first = SqliteStore::open(&path).unwrap();
    first
        .initialize_board(&BoardConfig::standard("Shared"), "user")
        .unwrap();
    let second = SqliteStore::open(&path).unwrap();

    // Interleave writers as two processes would.
    for i in 0..3 {
        first
            .add_task(&NewTask::new(format!("first {i}")), "user")
            .unwrap();
        second
            .add_task(&NewTask::new(format!("second {i}")), "user")
            .unwrap();
    }

    let mut ids: Vec<i64> = first
        .list_tasks(&TaskFilter::default())
        .unwrap()
        .iter()
        .map(|t| t.board_task_id)
        .collect();
    ids.sort();
    assert_eq!(ids, (1..=6).collect::<Vec<i64>>());
}

#[test]
fn audit_ids_increase_across_transactions() {
    let store = new_board("B");
    store.add_task(&NewTask::new("A"), "user").unwrap();
    let first_max = store
        .get_history(&AuditFilter::default())
        .unwrap()
        .entries
        .first()
        .unwrap()
        .id;

    store.add_task(&NewTask::new("B"), "user").unwrap();
    let second_max = store
        .get_history(&AuditFilter::default())
        .unwrap()
        .entries
        .first()
        .unwrap()
        .id;

    assert!(second_max > first_max);
}

#[test]
fn scored_backlog_ranks_bottlenecks_first() {
    let store = Arc::new(new_board("B"));
    store.add_task(&NewTask::new("Quiet task"), "user").unwrap();
    store.add_task(&NewTask::new("Bottleneck"), "user").unwrap();
    store.add_task(&NewTask::new("Waiting A"), "user").unwrap();
    store.add_task(&NewTask::new("Waiting B"), "user").unwrap();
    store.add_dependency("#3", "#2").unwrap();
    store.add_dependency("#4", "#2").unwrap();

    let counts = Arc::clone(&store);
    let service = kaban_scoring::ScoringService::with_defaults(Arc::new(move |task| {
        counts.blocking_count(&task.id).unwrap_or(0)
    }));

    let now = chrono::Utc::now();
    let tasks = store.list_tasks(&TaskFilter::default()).unwrap();
    let ranked = service.rank_tasks_with("blocking", &tasks, now).unwrap();
    assert_eq!(ranked[0].task.board_task_id, 2);
    assert_eq!(ranked[0].total, 100.0);
}

#[test]
fn blocked_filter_matches_link_state() {
    let store = new_board("B");
    store.add_task(&NewTask::new("Blocked one"), "user").unwrap();
    store.add_task(&NewTask::new("Blocker"), "user").unwrap();
    store.add_task(&NewTask::new("Free"), "user").unwrap();
    store.add_dependency("#1", "#2").unwrap();

    let blocked = store
        .list_tasks(&TaskFilter {
            blocked: Some(true),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].board_task_id, 1);
    assert_eq!(blocked[0].depends_on.len(), 1);

    let unblocked = store
        .list_tasks(&TaskFilter {
            blocked: Some(false),
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<i64> = unblocked.iter().map(|t| t.board_task_id).collect();
    assert_eq!(ids, vec![2, 3]);
}
