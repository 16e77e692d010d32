//! Task types exchanged with the TaskMaster REST API.
//!
//! [`Task`] is the server's representation (identifier and timestamps
//! assigned by the backend). [`NewTask`] and [`TaskPatch`] are the create
//! and partial-update request bodies, and [`ListFilters`] carries the
//! optional query parameters of the list endpoint.
//!
//! Enum values are serialized with the backend's stored strings and also
//! accept their English names on input.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::{self, clamp_completion};

/// Category name used for tasks without a category.
pub const DEFAULT_CATEGORY: &str = "General";

/// Opaque task identifier assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Error returned when parsing a status or priority from user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Progress state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[default]
    #[serde(rename = "Yapılacak", alias = "Todo")]
    Todo,
    /// Being worked on.
    #[serde(rename = "Devam Ediyor", alias = "InProgress")]
    InProgress,
    /// Finished.
    #[serde(rename = "Tamamlandı", alias = "Done")]
    Done,
}

impl TaskStatus {
    /// All statuses in workflow order.
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Done];

    /// The string the backend stores and filters on.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Todo => "Yapılacak",
            Self::InProgress => "Devam Ediyor",
            Self::Done => "Tamamlandı",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "todo" | "yapılacak" => Ok(Self::Todo),
            "in_progress" | "inprogress" | "devam_ediyor" => Ok(Self::InProgress),
            "done" | "tamamlandı" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// Urgency of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Can wait.
    #[serde(rename = "Düşük", alias = "Low")]
    Low,
    /// Normal priority.
    #[default]
    #[serde(rename = "Orta", alias = "Medium")]
    Medium,
    /// Should be done soon.
    #[serde(rename = "Yüksek", alias = "High")]
    High,
    /// Needs attention now.
    #[serde(rename = "Acil", alias = "Urgent")]
    Urgent,
}

impl Priority {
    /// The string the backend stores and filters on.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Low => "Düşük",
            Self::Medium => "Orta",
            Self::High => "Yüksek",
            Self::Urgent => "Acil",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "düşük" => Ok(Self::Low),
            "medium" | "orta" => Ok(Self::Medium),
            "high" | "yüksek" => Ok(Self::High),
            "urgent" | "acil" => Ok(Self::Urgent),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// A task as returned by the server.
///
/// `category_name`, `category_color` and `category_icon` are denormalized
/// from the owning category by the backend. Status and completion
/// percentage are independent: 100% does not imply [`TaskStatus::Done`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Server-assigned identifier.
    pub id: TaskId,
    /// Owner of the task, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Non-empty title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning category, if any.
    #[serde(default)]
    pub category_id: Option<String>,
    /// Display name of the owning category.
    #[serde(default)]
    pub category_name: Option<String>,
    /// Color of the owning category (`#rrggbb`).
    #[serde(default)]
    pub category_color: Option<String>,
    /// Icon name of the owning category.
    #[serde(default)]
    pub category_icon: Option<String>,
    /// Ordered tags.
    #[serde(default, deserialize_with = "fields::null_as_empty")]
    pub tags: Vec<String>,
    /// Urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Progress state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Completion in percent, always within `[0, 100]`.
    #[serde(default, deserialize_with = "fields::completion")]
    pub completion_percentage: u8,
    /// Encoded images or image URIs.
    #[serde(default, deserialize_with = "fields::null_as_empty")]
    pub images: Vec<String>,
    /// Optional deadline.
    #[serde(default, with = "fields::timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
    /// Creation time (server clock).
    #[serde(with = "fields::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last modification time (server clock).
    #[serde(with = "fields::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Returns the category name used for grouping.
    ///
    /// Falls back to [`DEFAULT_CATEGORY`] when the task has no category name.
    #[must_use]
    pub fn resolved_category(&self) -> &str {
        self.category_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
    }

    /// Whether the task's status is [`TaskStatus::Done`].
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

/// Validation failures for request bodies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// An update must change at least one field.
    #[error("no fields to update")]
    EmptyPatch,
}

/// Body of a create request: every task field except id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Non-empty title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning category, if any.
    #[serde(default)]
    pub category_id: Option<String>,
    /// Ordered tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Initial progress state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Initial completion percentage.
    #[serde(default, deserialize_with = "fields::completion")]
    pub completion_percentage: u8,
    /// Encoded images or image URIs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Optional deadline.
    #[serde(default, with = "fields::timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Creates a request with the given title and backend defaults
    /// (no category, medium priority, todo, 0%).
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            category_id: None,
            tags: Vec::new(),
            priority: Priority::default(),
            status: TaskStatus::default(),
            completion_percentage: 0,
            images: Vec::new(),
            due_date: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Assigns the task to a category.
    #[must_use]
    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    /// Sets the tag list.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the initial status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the completion percentage, clamped into `[0, 100]`.
    #[must_use]
    pub fn with_completion(mut self, percent: i64) -> Self {
        self.completion_percentage = clamp_completion(percent);
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Checks the request before it is sent or stored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TitleEmpty`] if the title is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.is_empty() {
            return Err(ValidationError::TitleEmpty);
        }
        Ok(())
    }
}

/// Body of a partial update: only `Some` fields are sent and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title (must be non-empty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Replacement tag list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New completion percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<u8>,
    /// Replacement image list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// New due date.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "fields::timestamp::option"
    )]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// Returns `true` if no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.tags.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.completion_percentage.is_none()
            && self.images.is_none()
            && self.due_date.is_none()
    }

    /// Sets the completion percentage, clamped into `[0, 100]`.
    #[must_use]
    pub fn with_completion(mut self, percent: i64) -> Self {
        self.completion_percentage = Some(clamp_completion(percent));
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Checks the patch before it is sent or applied.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPatch`] if nothing would change, or
    /// [`ValidationError::TitleEmpty`] if the new title is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if self.title.as_deref() == Some("") {
            return Err(ValidationError::TitleEmpty);
        }
        Ok(())
    }

    /// Applies the patch to a task in place.
    ///
    /// Does not touch `updated_at`; the caller owns the clock.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(category_id) = &self.category_id {
            task.category_id = Some(category_id.clone());
        }
        if let Some(tags) = &self.tags {
            task.tags.clone_from(tags);
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(percent) = self.completion_percentage {
            task.completion_percentage = percent.min(fields::MAX_COMPLETION);
        }
        if let Some(images) = &self.images {
            task.images.clone_from(images);
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
    }
}

/// Optional filters of the list endpoint, passed through as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilters {
    /// Only tasks in this category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Only tasks with this status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Only tasks with this priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl ListFilters {
    /// No filtering.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            category_id: None,
            status: None,
            priority: None,
        }
    }

    /// Returns `true` if no filter is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category_id.is_none() && self.status.is_none() && self.priority.is_none()
    }

    /// Returns the filters as query parameter pairs, skipping unset ones.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category_id) = &self.category_id {
            pairs.push(("category_id", category_id.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.wire_name().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.wire_name().to_string()));
        }
        pairs
    }

    /// Whether a task passes every set filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.category_id
            .as_ref()
            .is_none_or(|id| task.category_id.as_ref() == Some(id))
            && self.status.is_none_or(|status| task.status == status)
            && self.priority.is_none_or(|priority| task.priority == priority)
    }
}
