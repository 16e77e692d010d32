//! Boundary to the TaskMaster REST service.
//!
//! Defines the [`TaskService`] trait the sync controller talks to.
//! Implementations:
//! - [`http::HttpTaskService`]: the real REST client (`reqwest`)
//! - [`memory::InMemoryTaskService`]: scriptable in-process service for tests

pub mod http;
pub mod memory;

use serde_json::Value;
use taskmaster_proto::category::Category;
use taskmaster_proto::task::{ListFilters, NewTask, Task, TaskId, TaskPatch};

/// Errors produced at the service boundary, before classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server rejected the bearer credential (HTTP 401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The addressed resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// No response was received (connection refused, DNS, reset).
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The request did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// Any other non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason, or a generic fallback.
        message: String,
    },

    /// A success response whose body could not be read.
    #[error("unreadable response body: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, client setup).
    #[error("http client error: {0}")]
    Client(String),
}

/// Async client of the task endpoints.
///
/// Every method is a single request/response exchange; implementations
/// keep no task state on behalf of the caller. `list_tasks` returns the
/// raw JSON body so the caller decides how to treat unexpected shapes.
pub trait TaskService: Send + Sync {
    /// Lists tasks, passing the filters through as query parameters.
    fn list_tasks(
        &self,
        filters: &ListFilters,
    ) -> impl std::future::Future<Output = Result<Value, RemoteError>> + Send;

    /// Creates a task and returns the server's copy of it.
    fn create_task(
        &self,
        task: &NewTask,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// Applies a partial update and returns the updated task.
    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<Task, RemoteError>> + Send;

    /// Deletes a task.
    fn delete_task(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Lists the user's categories.
    fn list_categories(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Category>, RemoteError>> + Send;

    /// Fetches suggested task titles.
    fn suggestions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RemoteError>> + Send;

    /// Sends one message to the assistant and returns its reply.
    fn chat(
        &self,
        message: &str,
    ) -> impl std::future::Future<Output = Result<String, RemoteError>> + Send;
}
