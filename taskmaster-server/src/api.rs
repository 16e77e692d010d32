//! HTTP surface of the reference server: routing, bearer authentication,
//! handlers, and error responses.
//!
//! Every route requires `Authorization: Bearer <token>`. Each configured
//! token is one user; users never see each other's tasks or categories.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use taskmaster_proto::api::{self, ErrorBody};
use taskmaster_proto::assistant::{ChatReply, ChatRequest};
use taskmaster_proto::category::Category;
use taskmaster_proto::task::{ListFilters, NewTask, Task, TaskId, TaskPatch, ValidationError};
use tokio::task::JoinHandle;

use crate::store::{StoreError, TaskStore};

/// Titles returned by the suggestions endpoint.
pub const SUGGESTIONS: [&str; 3] = ["Go to the market", "Finish the project", "Check emails"];

/// Shared server state: the store and the token-to-user map.
#[derive(Debug, Default)]
pub struct ApiState {
    pub store: TaskStore,
    users: HashMap<String, String>,
}

impl ApiState {
    /// Creates state accepting `tokens`; the n-th token is user `user-n`.
    #[must_use]
    pub fn new(tokens: &[String]) -> Self {
        let users = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| (token.clone(), format!("user-{}", i + 1)))
            .collect();
        Self {
            store: TaskStore::new(),
            users,
        }
    }

    fn user_for(&self, token: &str) -> Option<&str> {
        self.users.get(token).map(String::as_str)
    }
}

/// Error response in the `{"detail": ...}` shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unprocessable(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::TaskNotFound => Self::NotFound("Task not found."),
            StoreError::CategoryNotFound => {
                Self::NotFound("Category not found or not owned by you.")
            }
            StoreError::Invalid(ValidationError::EmptyPatch) => {
                Self::BadRequest("No fields to update.".to_string())
            }
            StoreError::Invalid(e @ ValidationError::TitleEmpty) => {
                Self::Unprocessable(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// The authenticated caller's user id.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<Arc<ApiState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("Missing bearer token."))?;

        state
            .user_for(token.trim())
            .map(|user| Self(user.to_string()))
            .ok_or(ApiError::Unauthorized("Invalid token."))
    }
}

async fn list_tasks(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    Query(filters): Query<ListFilters>,
) -> Json<Vec<Task>> {
    Json(state.store.list(&user, &filters).await)
}

async fn create_task(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    Json(new): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.store.create(&user, new).await?;
    tracing::info!(user = %user, task_id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let task = state.store.update(&user, &TaskId::new(id), &patch).await?;
    tracing::info!(user = %user, task_id = %task.id, "task updated");
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = TaskId::new(id);
    state.store.delete(&user, &id).await?;
    tracing::info!(user = %user, task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_categories(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
) -> Json<Vec<Category>> {
    Json(state.store.categories(&user).await)
}

async fn suggestions(AuthUser(user): AuthUser) -> Json<Vec<String>> {
    tracing::debug!(user = %user, "suggestions requested");
    Json(SUGGESTIONS.iter().map(ToString::to_string).collect())
}

async fn chat(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ChatRequest>,
) -> Json<ChatReply> {
    let response = state.store.summary_reply(&user, &request.message).await;
    Json(ChatReply { response })
}

/// Builds the router over `state`.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(api::TASKS, get(list_tasks).post(create_task))
        .route(
            &format!("{}/{{id}}", api::TASKS),
            put(update_task).delete(delete_task),
        )
        .route(api::CATEGORIES, get(list_categories))
        .route(api::SUGGESTIONS, post(suggestions))
        .route(api::CHAT, post(chat))
        .with_state(state)
}

/// Starts the server on `addr` with default state accepting `tokens`.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn start_server(
    addr: &str,
    tokens: &[String],
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_state(addr, Arc::new(ApiState::new(tokens))).await
}

/// Starts the server with pre-built state and returns the bound address
/// and the task serving it.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ApiState>,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "taskmaster server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts the server on an ephemeral localhost port for tests.
///
/// # Errors
///
/// Returns an error if no local port can be bound.
pub async fn start_test_server(
    tokens: &[&str],
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    let tokens: Vec<String> = tokens.iter().map(ToString::to_string).collect();
    start_server("127.0.0.1:0", &tokens).await
}
