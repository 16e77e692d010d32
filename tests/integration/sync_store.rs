//! Integration tests for the sync controller against the in-memory service.
//!
//! Covers refresh deduplication, optimistic delete, failure classification,
//! generation ordering of list responses, and the delete failure policies.
//!
//! Run with: `cargo test --test sync_store`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use taskmaster::remote::RemoteError;
use taskmaster::remote::memory::{InMemoryTaskService, Operation};
use taskmaster::sync::controller::{DeletePolicy, SyncController, SyncOptions};
use taskmaster::sync::views::{self, StatusFilter};
use taskmaster::sync::{ErrorKind, SyncError};
use taskmaster_proto::task::{
    DEFAULT_CATEGORY, ListFilters, NewTask, Priority, Task, TaskId, TaskPatch, TaskStatus,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn task(id: &str, status: TaskStatus, category: Option<&str>) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::new(id),
        user_id: None,
        title: format!("task {id}"),
        description: None,
        category_id: category.map(|c| format!("cat-{c}")),
        category_name: category.map(ToString::to_string),
        category_color: None,
        category_icon: None,
        tags: Vec::new(),
        priority: Priority::Medium,
        status,
        completion_percentage: 0,
        images: Vec::new(),
        due_date: None,
        created_at: now,
        updated_at: now,
    }
}

fn controller(tasks: Vec<Task>) -> SyncController<InMemoryTaskService> {
    SyncController::new(InMemoryTaskService::with_tasks(tasks))
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

/// Polls until the service has received `n` calls of `op`.
async fn wait_for_calls(service: &InMemoryTaskService, op: Operation, n: usize) {
    for _ in 0..200 {
        if service.calls(op) >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {n} {op:?} calls, saw {}", service.calls(op));
}

fn none() -> ListFilters {
    ListFilters::none()
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_replaces_cache_and_returns_tasks() {
    let c = controller(vec![task("a", TaskStatus::Todo, None), task("b", TaskStatus::Done, None)]);

    let returned = c.refresh(&none()).await;
    assert_eq!(ids(&returned), ["a", "b"]);

    let snapshot = c.read();
    assert_eq!(ids(snapshot.tasks()), ["a", "b"]);
    assert!(!snapshot.is_busy());
    assert!(snapshot.error().is_none());
}

#[tokio::test]
async fn concurrent_refreshes_issue_one_request() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.service().pause(Operation::List);

    let first = tokio::spawn({
        let c = c.clone();
        async move { c.refresh(&none()).await }
    });
    wait_for_calls(c.service(), Operation::List, 1).await;
    assert!(c.read().is_busy());

    // Overlapping calls return the current (still empty) snapshot at once.
    let filters = none();
    let overlapping = join_all((0..3).map(|_| c.refresh(&filters))).await;
    assert!(overlapping.iter().all(|tasks| tasks.is_empty()));
    assert_eq!(c.service().calls(Operation::List), 1);

    c.service().resume(Operation::List);
    let first = first.await.unwrap();
    assert_eq!(ids(&first), ["a"]);
    assert_eq!(c.service().calls(Operation::List), 1);
    assert!(!c.read().is_busy());
}

#[tokio::test]
async fn refresh_after_completion_issues_a_new_request() {
    let c = controller(vec![]);
    c.refresh(&none()).await;
    c.refresh(&none()).await;
    assert_eq!(c.service().calls(Operation::List), 2);
}

#[tokio::test]
async fn filters_are_passed_through() {
    let mut urgent = task("u", TaskStatus::Todo, None);
    urgent.priority = Priority::Urgent;
    let c = controller(vec![urgent, task("m", TaskStatus::Todo, None)]);

    let filters = ListFilters {
        priority: Some(Priority::Urgent),
        ..ListFilters::default()
    };
    assert_eq!(ids(&c.refresh(&filters).await), ["u"]);
}

#[tokio::test]
async fn wrapped_list_response_is_accepted() {
    let c = controller(vec![]);
    c.service().set_list_response(json!({
        "tasks": [{
            "id": "w1",
            "title": "wrapped",
            "status": "Tamamlandı",
            "created_at": "2024-05-01T09:00:00",
            "updated_at": "2024-05-01T09:00:00"
        }]
    }));

    let tasks = c.refresh(&none()).await;
    assert_eq!(ids(&tasks), ["w1"]);
    assert_eq!(tasks[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn malformed_list_response_yields_empty_cache() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    assert_eq!(c.read().len(), 1);

    for body in [json!({"items": []}), json!("tasks"), json!(42), json!({"tasks": {}})] {
        c.service().set_list_response(body);
        assert!(c.refresh(&none()).await.is_empty());
        let snapshot = c.read();
        assert!(snapshot.is_empty());
        assert!(snapshot.error().is_none());
    }
}

#[tokio::test]
async fn network_failure_clears_cache_and_records_unreachable() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;

    c.service().fail_next(
        Operation::List,
        RemoteError::Unreachable("connection refused".into()),
    );
    assert!(c.refresh(&none()).await.is_empty());

    let snapshot = c.read();
    assert!(snapshot.is_empty());
    let error = snapshot.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Unreachable);
    assert!(error.is_network_failure());
    assert!(!snapshot.is_busy());
}

#[tokio::test]
async fn server_error_message_is_kept() {
    let c = controller(vec![]);
    c.service().fail_next(
        Operation::List,
        RemoteError::Status {
            status: 500,
            message: "database unavailable".into(),
        },
    );
    c.refresh(&none()).await;

    assert_eq!(
        c.read().error(),
        Some(&SyncError::Server {
            status: Some(500),
            message: "database unavailable".into()
        })
    );

    // The next successful refresh clears it.
    c.refresh(&none()).await;
    assert!(c.read().error().is_none());
}

#[tokio::test]
async fn slow_refresh_times_out() {
    let service = InMemoryTaskService::with_tasks(vec![task("a", TaskStatus::Todo, None)]);
    let options = SyncOptions {
        request_timeout: Duration::from_millis(50),
        ..SyncOptions::default()
    };
    let c = SyncController::with_options(service, options);
    c.service().pause(Operation::List);

    assert!(c.refresh(&none()).await.is_empty());
    assert_eq!(c.read().error(), Some(&SyncError::Timeout));
    assert!(!c.read().is_busy());

    c.service().resume(Operation::List);
}

// ---------------------------------------------------------------------------
// Create / update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_refreshes_instead_of_inserting() {
    let c = controller(vec![]);
    c.service().pause(Operation::List);

    let create = tokio::spawn({
        let c = c.clone();
        async move { c.create_task(&NewTask::new("buy milk")).await }
    });

    // The create is confirmed and its refresh is in flight; nothing was
    // inserted locally.
    wait_for_calls(c.service(), Operation::List, 1).await;
    assert_eq!(c.service().calls(Operation::Create), 1);
    assert!(c.read().is_empty());

    c.service().resume(Operation::List);
    let created = create.await.unwrap().unwrap();
    assert_eq!(created.title, "buy milk");
    assert!(c.read().contains(&created.id));
}

#[tokio::test]
async fn update_refreshes_with_server_copy() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;

    let patch = TaskPatch::default().with_completion(100);
    let updated = c.update_task(&TaskId::new("a"), &patch).await.unwrap();
    assert_eq!(updated.completion_percentage, 100);
    // Completion does not imply done.
    assert_eq!(updated.status, TaskStatus::Todo);

    let snapshot = c.read();
    assert_eq!(snapshot.get(&TaskId::new("a")).unwrap().completion_percentage, 100);
    assert_eq!(c.service().calls(Operation::List), 2);
}

#[tokio::test]
async fn failed_update_propagates_and_is_recorded() {
    let c = controller(vec![]);
    let err = c
        .update_task(&TaskId::new("ghost"), &TaskPatch::default().with_title("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(c.read().error(), Some(&err));
    assert_eq!(c.service().calls(Operation::List), 0);
}

#[tokio::test]
async fn validation_failure_carries_server_message() {
    let c = controller(vec![]);
    let err = c.create_task(&NewTask::new("")).await.unwrap_err();
    assert_eq!(
        err,
        SyncError::Server {
            status: Some(422),
            message: "task title cannot be empty".into()
        }
    );
}

#[tokio::test]
async fn unauthorized_clears_cache() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;

    c.service()
        .fail_next(Operation::Create, RemoteError::Unauthorized("expired".into()));
    let err = c.create_task(&NewTask::new("x")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let snapshot = c.read();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.error().map(SyncError::kind), Some(ErrorKind::Unauthorized));
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_before_network_resolves() {
    let c = controller(vec![task("a", TaskStatus::Todo, None), task("b", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().pause(Operation::Delete);

    let pending = c.delete_task(&TaskId::new("a")).unwrap();
    assert_eq!(pending.task_id().as_str(), "a");
    assert!(!c.read().contains(&TaskId::new("a")));
    assert_eq!(ids(c.read().tasks()), ["b"]);

    c.service().resume(Operation::Delete);
    pending.wait().await.unwrap();
    assert!(!c.read().contains(&TaskId::new("a")));
    assert_eq!(ids(&c.service().tasks()), ["b"]);
}

#[tokio::test]
async fn duplicate_delete_is_a_no_op() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().pause(Operation::Delete);

    let first = c.delete_task(&TaskId::new("a")).unwrap();
    assert!(c.delete_task(&TaskId::new("a")).is_none());
    wait_for_calls(c.service(), Operation::Delete, 1).await;

    c.service().resume(Operation::Delete);
    first.wait().await.unwrap();
    assert_eq!(c.service().calls(Operation::Delete), 1);
}

#[tokio::test]
async fn delete_not_found_counts_as_success() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service()
        .fail_next(Operation::Delete, RemoteError::NotFound("gone".into()));

    c.delete_task(&TaskId::new("a")).unwrap().wait().await.unwrap();

    let snapshot = c.read();
    assert!(snapshot.is_empty());
    assert!(snapshot.error().is_none());
    // No recovery refresh after a successful delete.
    assert_eq!(c.service().calls(Operation::List), 1);
}

#[tokio::test]
async fn failed_delete_keeps_task_removed_until_refresh() {
    let c = controller(vec![task("a", TaskStatus::Todo, None), task("b", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().fail_next(
        Operation::Delete,
        RemoteError::Status {
            status: 500,
            message: "boom".into(),
        },
    );
    c.service().pause(Operation::List);

    let mut updates = c.subscribe();
    let pending = c.delete_task(&TaskId::new("a")).unwrap();
    updates.wait_for(|s| s.error().is_some()).await.unwrap();

    let snapshot = c.read();
    assert!(!snapshot.contains(&TaskId::new("a")));
    assert_eq!(snapshot.error().map(SyncError::kind), Some(ErrorKind::Server));

    // The follow-up refresh restores the server's view and keeps the error.
    c.service().resume(Operation::List);
    let err = pending.wait().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);

    let snapshot = c.read();
    assert_eq!(ids(snapshot.tasks()), ["a", "b"]);
    assert_eq!(snapshot.error(), Some(&err));
}

#[tokio::test]
async fn failed_delete_rolls_back_when_configured() {
    let service = InMemoryTaskService::with_tasks(vec![
        task("a", TaskStatus::Todo, None),
        task("b", TaskStatus::Todo, None),
    ]);
    let options = SyncOptions {
        delete_policy: DeletePolicy::RollBack,
        ..SyncOptions::default()
    };
    let c = SyncController::with_options(service, options);
    c.refresh(&none()).await;
    c.service()
        .fail_next(Operation::Delete, RemoteError::Unreachable("reset".into()));
    c.service().pause(Operation::List);

    let mut updates = c.subscribe();
    let pending = c.delete_task(&TaskId::new("a")).unwrap();
    updates.wait_for(|s| s.error().is_some()).await.unwrap();

    assert_eq!(ids(c.read().tasks()), ["a", "b"]);

    c.service().resume(Operation::List);
    assert_eq!(pending.wait().await.unwrap_err().kind(), ErrorKind::Unreachable);
}

#[tokio::test]
async fn delete_can_be_retried_after_failure() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().fail_next(Operation::Delete, RemoteError::Timeout);

    assert!(c.delete_task(&TaskId::new("a")).unwrap().wait().await.is_err());
    assert!(c.read().contains(&TaskId::new("a")));

    c.delete_task(&TaskId::new("a")).unwrap().wait().await.unwrap();
    assert!(c.read().is_empty());
    assert_eq!(c.service().calls(Operation::Delete), 2);
}

// ---------------------------------------------------------------------------
// Ordering of list responses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_issued_before_delete_settles_does_not_resurrect() {
    let c = controller(vec![task("a", TaskStatus::Todo, None), task("b", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().pause(Operation::List);

    // This response is computed while "a" still exists server-side.
    let stale = tokio::spawn({
        let c = c.clone();
        async move { c.refresh(&none()).await }
    });
    wait_for_calls(c.service(), Operation::List, 2).await;

    c.delete_task(&TaskId::new("a")).unwrap().wait().await.unwrap();

    c.service().resume(Operation::List);
    let tasks = stale.await.unwrap();
    assert_eq!(ids(&tasks), ["b"]);
    assert!(!c.read().contains(&TaskId::new("a")));
}

#[tokio::test]
async fn newest_list_request_wins() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().pause(Operation::List);

    // Older refresh, answered with the pre-create list.
    let older = tokio::spawn({
        let c = c.clone();
        async move { c.refresh(&none()).await }
    });
    wait_for_calls(c.service(), Operation::List, 2).await;

    // The create's own refresh is issued later and sees the new task.
    let create = tokio::spawn({
        let c = c.clone();
        async move { c.create_task(&NewTask::new("fresh")).await }
    });
    wait_for_calls(c.service(), Operation::List, 3).await;

    c.service().resume(Operation::List);
    older.await.unwrap();
    let created = create.await.unwrap().unwrap();

    let snapshot = c.read();
    assert!(snapshot.contains(&created.id));
    assert!(snapshot.contains(&TaskId::new("a")));
}

#[tokio::test]
async fn reset_discards_in_flight_responses() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().pause(Operation::List);

    let in_flight = tokio::spawn({
        let c = c.clone();
        async move { c.refresh(&none()).await }
    });
    wait_for_calls(c.service(), Operation::List, 2).await;

    c.reset();
    assert!(c.read().is_empty());

    c.service().resume(Operation::List);
    in_flight.await.unwrap();
    assert!(c.read().is_empty());
    assert!(c.read().error().is_none());
}

#[tokio::test]
async fn delete_finishing_after_reset_leaves_new_session_alone() {
    let service = InMemoryTaskService::with_tasks(vec![
        task("a", TaskStatus::Todo, None),
        task("b", TaskStatus::Todo, None),
    ]);
    let options = SyncOptions {
        delete_policy: DeletePolicy::RollBack,
        ..SyncOptions::default()
    };
    let c = SyncController::with_options(service, options);
    c.refresh(&none()).await;
    c.service().fail_next(
        Operation::Delete,
        RemoteError::Status {
            status: 500,
            message: "boom".into(),
        },
    );
    c.service().pause(Operation::Delete);

    let pending = c.delete_task(&TaskId::new("a")).unwrap();
    wait_for_calls(c.service(), Operation::Delete, 1).await;
    c.reset();

    c.service().resume(Operation::Delete);
    assert_eq!(pending.wait().await.unwrap_err().kind(), ErrorKind::Server);

    // No restore, no recorded error, no recovery refresh.
    let snapshot = c.read();
    assert!(snapshot.is_empty());
    assert!(snapshot.error().is_none());
    assert!(!snapshot.is_busy());
    assert_eq!(c.service().calls(Operation::List), 1);
}

#[tokio::test]
async fn write_finishing_after_reset_does_not_refresh() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;
    c.service().pause(Operation::Create);

    let create = tokio::spawn({
        let c = c.clone();
        async move { c.create_task(&NewTask::new("late")).await }
    });
    wait_for_calls(c.service(), Operation::Create, 1).await;
    assert!(c.read().is_busy());

    c.reset();
    c.service().resume(Operation::Create);
    create.await.unwrap().unwrap();

    let snapshot = c.read();
    assert!(snapshot.is_empty());
    assert!(snapshot.error().is_none());
    assert!(!snapshot.is_busy());
    assert_eq!(c.service().calls(Operation::List), 1);
}

// ---------------------------------------------------------------------------
// Views, subscription, and pass-through calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn category_aggregates_after_refresh() {
    let c = controller(vec![
        task("a", TaskStatus::Todo, None),
        task("b", TaskStatus::Done, Some("Work")),
    ]);
    let tasks = c.refresh(&none()).await;

    let aggregates = views::category_aggregates(&tasks);
    let summary: Vec<(&str, usize, usize)> = aggregates
        .iter()
        .map(|a| (a.name, a.count, a.completed))
        .collect();
    assert_eq!(summary, [(DEFAULT_CATEGORY, 1, 0), ("Work", 1, 1)]);

    let done = views::filter_by_status(&tasks, StatusFilter::Only(TaskStatus::Done));
    assert_eq!(done.len(), 1);
}

#[tokio::test]
async fn subscribers_see_every_change() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    let mut updates = c.subscribe();

    c.refresh(&none()).await;
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().len(), 1);

    c.delete_task(&TaskId::new("a")).unwrap().wait().await.unwrap();
    assert!(updates.borrow_and_update().is_empty());
}

#[tokio::test]
async fn suggestions_are_best_effort() {
    let c = controller(vec![]);
    c.service()
        .set_suggestions(vec!["Water plants".into(), "Call mom".into()]);
    assert_eq!(c.suggestions().await.len(), 2);

    c.service().fail_next(Operation::Suggestions, RemoteError::Timeout);
    assert!(c.suggestions().await.is_empty());
    assert!(c.read().error().is_none());
}

#[tokio::test]
async fn chat_and_categories_leave_cache_alone() {
    let c = controller(vec![task("a", TaskStatus::Todo, None)]);
    c.refresh(&none()).await;

    assert_eq!(c.chat("hello").await.unwrap(), "echo: hello");
    assert!(c.categories().await.unwrap().is_empty());

    c.service()
        .fail_next(Operation::Chat, RemoteError::Unreachable("down".into()));
    assert_eq!(c.chat("hello").await.unwrap_err().kind(), ErrorKind::Unreachable);
    assert_eq!(c.read().len(), 1);
    assert!(c.read().error().is_none());
}
