//! Route table and error body of the TaskMaster REST API.
//!
//! Shared by the HTTP client and the reference server so both sides agree
//! on paths. Task-scoped routes take the task id as the last segment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// List (`GET`) and create (`POST`) tasks.
pub const TASKS: &str = "/api/tasks";

/// List categories (`GET`).
pub const CATEGORIES: &str = "/api/categories";

/// Suggested task titles (`POST`, no body).
pub const SUGGESTIONS: &str = "/api/ai/suggestions";

/// Assistant chat (`POST`).
pub const CHAT: &str = "/api/ai/chat";

/// Field under which a wrapped list response carries its tasks.
pub const TASKS_FIELD: &str = "tasks";

/// Path of a single task, for update (`PUT`) and delete (`DELETE`).
#[must_use]
pub fn task_path(task_id: &str) -> String {
    format!("{TASKS}/{task_id}")
}

/// Error body in the backend's `{"detail": ...}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub detail: String,
}

impl ErrorBody {
    /// Creates an error body with the given reason.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    /// Extracts a human-readable message from an arbitrary error body.
    ///
    /// Understands `{"detail": "..."}`, validation lists
    /// (`{"detail": [{"msg": "..."}]}`) and `{"message": "..."}`.
    #[must_use]
    pub fn message_from(body: &Value) -> Option<String> {
        match body.get("detail") {
            Some(Value::String(detail)) => return Some(detail.clone()),
            Some(Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
        body.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
