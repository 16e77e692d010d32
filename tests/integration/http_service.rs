//! End-to-end tests: sync controller over HTTP against a live TaskMaster
//! server on an ephemeral localhost port.
//!
//! Run with: `cargo test --test http_service`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use taskmaster::remote::http::HttpTaskService;
use taskmaster::sync::controller::SyncController;
use taskmaster::sync::views;
use taskmaster::sync::{ErrorKind, SyncError};
use taskmaster_proto::task::{ListFilters, NewTask, Priority, TaskId, TaskPatch, TaskStatus};
use taskmaster_server::api::start_test_server;

const TOKEN: &str = "it-token";

/// Starts a server and returns a controller authenticated with `token`.
async fn connect(token: &str) -> SyncController<HttpTaskService> {
    let (addr, _handle) = start_test_server(&[TOKEN]).await.unwrap();
    let service = HttpTaskService::new(
        &format!("http://{addr}/"),
        Some(token.to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    SyncController::new(service)
}

#[tokio::test]
async fn task_lifecycle_over_http() {
    let c = connect(TOKEN).await;

    let categories = c.categories().await.unwrap();
    let names: Vec<&str> = categories.iter().map(|cat| cat.name.as_str()).collect();
    assert_eq!(names, ["General", "Work", "Personal"]);
    let work = &categories[1];

    let created = c
        .create_task(
            &NewTask::new("write report")
                .with_category(work.id.clone())
                .with_priority(Priority::High),
        )
        .await
        .unwrap();
    assert_eq!(created.category_name.as_deref(), Some("Work"));
    assert!(c.read().contains(&created.id));

    c.update_task(&created.id, &TaskPatch::default().with_status(TaskStatus::Done))
        .await
        .unwrap();
    let snapshot = c.read();
    let aggregates = views::category_aggregates(snapshot.tasks());
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0].name, "Work");
    assert_eq!((aggregates[0].count, aggregates[0].completed), (1, 1));

    c.delete_task(&created.id).unwrap().wait().await.unwrap();
    assert!(c.read().is_empty());
    assert!(c.refresh(&ListFilters::none()).await.is_empty());
    assert!(c.read().error().is_none());
}

#[tokio::test]
async fn list_filters_reach_the_server() {
    let c = connect(TOKEN).await;
    c.create_task(&NewTask::new("open")).await.unwrap();
    c.create_task(&NewTask::new("closed").with_status(TaskStatus::Done))
        .await
        .unwrap();

    let done = c
        .refresh(&ListFilters {
            status: Some(TaskStatus::Done),
            ..ListFilters::default()
        })
        .await;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].title, "closed");

    // Writes refresh with the last filters used.
    c.create_task(&NewTask::new("also open")).await.unwrap();
    assert_eq!(c.read().len(), 1);

    assert_eq!(c.refresh(&ListFilters::none()).await.len(), 3);
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let c = connect("wrong-token").await;

    assert!(c.refresh(&ListFilters::none()).await.is_empty());
    let error = c.read().error().cloned().unwrap();
    assert_eq!(error.kind(), ErrorKind::Unauthorized);
    assert_eq!(error, SyncError::Unauthorized("Invalid token.".into()));
}

#[tokio::test]
async fn unreachable_server_is_a_network_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let service = HttpTaskService::new(
        &format!("http://{addr}"),
        Some(TOKEN.to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    let c = SyncController::new(service);

    assert!(c.refresh(&ListFilters::none()).await.is_empty());
    let snapshot = c.read();
    let error = snapshot.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Unreachable);
    assert!(error.is_network_failure());
    assert!(c.suggestions().await.is_empty());
}

#[tokio::test]
async fn deleting_unknown_task_succeeds() {
    let c = connect(TOKEN).await;
    c.delete_task(&TaskId::new("no-such-task"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert!(c.read().error().is_none());
}

#[tokio::test]
async fn server_validation_errors_carry_detail() {
    let c = connect(TOKEN).await;

    let err = c.create_task(&NewTask::new("")).await.unwrap_err();
    assert_eq!(
        err,
        SyncError::Server {
            status: Some(422),
            message: "task title cannot be empty".into()
        }
    );

    let err = c
        .update_task(&TaskId::new("missing"), &TaskPatch::default().with_title("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn suggestions_and_chat() {
    let c = connect(TOKEN).await;

    let suggestions = c.suggestions().await;
    assert_eq!(suggestions.len(), 3);

    c.create_task(&NewTask::new("ship release").with_priority(Priority::Urgent))
        .await
        .unwrap();
    let reply = c.chat("what should I prioritize?").await.unwrap();
    assert!(reply.contains("ship release"));
}
