//! REST client for the TaskMaster backend.
//!
//! Thin `reqwest` wrapper: one request per call, bearer authentication,
//! and a uniform mapping of transport failures and non-success statuses
//! onto [`RemoteError`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskmaster_proto::api::{self, ErrorBody};
use taskmaster_proto::assistant::{ChatReply, ChatRequest};
use taskmaster_proto::category::Category;
use taskmaster_proto::task::{ListFilters, NewTask, Task, TaskId, TaskPatch};
use url::Url;

use super::{RemoteError, TaskService};

/// [`TaskService`] backed by HTTP requests to a TaskMaster server.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    /// Base URL without a trailing slash; API paths are appended to it.
    base_url: String,
    token: Option<String>,
}

impl HttpTaskService {
    /// Builds a client for the server at `base_url`.
    ///
    /// `timeout` bounds every request end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Client`] if the URL is not an absolute
    /// `http`/`https` URL or the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let parsed =
            Url::parse(base_url).map_err(|e| RemoteError::Client(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RemoteError::Client(format!(
                "unsupported scheme '{}' in {base_url}",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// The normalized base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // The body is best effort; a broken error body still yields the status.
        let body = response.json::<Value>().await.ok();
        let message = body
            .as_ref()
            .and_then(ErrorBody::message_from)
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));

        tracing::debug!(status = status.as_u16(), %message, "request rejected");
        Err(status_error(status, message))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout
    } else if error.is_builder() {
        RemoteError::Client(error.to_string())
    } else {
        RemoteError::Unreachable(error.to_string())
    }
}

fn status_error(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(message),
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        _ => RemoteError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

impl TaskService for HttpTaskService {
    async fn list_tasks(&self, filters: &ListFilters) -> Result<Value, RemoteError> {
        let request = self
            .client
            .get(self.url(api::TASKS))
            .query(&filters.query_pairs());
        self.json(request).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, RemoteError> {
        let request = self.client.post(self.url(api::TASKS)).json(task);
        self.json(request).await
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, RemoteError> {
        let request = self
            .client
            .put(self.url(&api::task_path(id.as_str())))
            .json(patch);
        self.json(request).await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        let request = self.client.delete(self.url(&api::task_path(id.as_str())));
        self.send(request).await.map(drop)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RemoteError> {
        self.json(self.client.get(self.url(api::CATEGORIES))).await
    }

    async fn suggestions(&self) -> Result<Vec<String>, RemoteError> {
        self.json(self.client.post(self.url(api::SUGGESTIONS))).await
    }

    async fn chat(&self, message: &str) -> Result<String, RemoteError> {
        let request = self.client.post(self.url(api::CHAT)).json(&ChatRequest {
            message: message.to_string(),
        });
        let reply: ChatReply = self.json(request).await?;
        Ok(reply.response)
    }
}
