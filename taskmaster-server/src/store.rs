//! In-memory per-user task and category store.
//!
//! Each user gets an independent [`UserData`] created on first access and
//! seeded with the default categories. Access is serialized by a tokio
//! [`RwLock`]; every operation is a single short critical section.

use std::collections::HashMap;

use chrono::Utc;
use taskmaster_proto::category::Category;
use taskmaster_proto::task::{
    ListFilters, NewTask, Priority, Task, TaskId, TaskPatch, TaskStatus, ValidationError,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Categories every new user starts with: name, color, icon.
const DEFAULT_CATEGORIES: [(&str, &str, &str); 3] = [
    ("General", "#808080", "list"),
    ("Work", "#007BFF", "briefcase"),
    ("Personal", "#28A745", "person"),
];

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("task not found")]
    TaskNotFound,

    /// The category does not exist or belongs to another user.
    #[error("category not found")]
    CategoryNotFound,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Default)]
struct UserData {
    categories: Vec<Category>,
    tasks: Vec<Task>,
}

impl UserData {
    fn seeded(user_id: &str) -> Self {
        let now = Utc::now();
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|(name, color, icon)| Category {
                id: Uuid::now_v7().to_string(),
                name: (*name).to_string(),
                color: Some((*color).to_string()),
                icon: Some((*icon).to_string()),
                user_id: Some(user_id.to_string()),
                created_at: Some(now),
            })
            .collect();
        Self {
            categories,
            tasks: Vec::new(),
        }
    }

    fn category(&self, id: &str) -> Result<&Category, StoreError> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .ok_or(StoreError::CategoryNotFound)
    }
}

/// Copies the category's display fields onto the task.
fn denormalize(task: &mut Task, category: Option<&Category>) {
    task.category_name = category.map(|c| c.name.clone());
    task.category_color = category.and_then(|c| c.color.clone());
    task.category_icon = category.and_then(|c| c.icon.clone());
}

/// Task and category storage for all users.
#[derive(Debug, Default)]
pub struct TaskStore {
    users: RwLock<HashMap<String, UserData>>,
}

impl TaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks of `user_id` passing `filters`, newest first.
    pub async fn list(&self, user_id: &str, filters: &ListFilters) -> Vec<Task> {
        let users = self.users.read().await;
        let Some(data) = users.get(user_id) else {
            return Vec::new();
        };
        let mut tasks: Vec<Task> = data
            .tasks
            .iter()
            .rev()
            .filter(|t| filters.matches(t))
            .cloned()
            .collect();
        // Stable sort over reverse insertion order: ties stay newest first.
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Categories of `user_id`, seeding the defaults on first access.
    pub async fn categories(&self, user_id: &str) -> Vec<Category> {
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_insert_with(|| UserData::seeded(user_id))
            .categories
            .clone()
    }

    /// Stores a new task and returns it with id and timestamps assigned.
    ///
    /// # Errors
    ///
    /// [`StoreError::Invalid`] for an empty title, or
    /// [`StoreError::CategoryNotFound`] if the category is not the user's.
    pub async fn create(&self, user_id: &str, new: NewTask) -> Result<Task, StoreError> {
        new.validate()?;

        let mut users = self.users.write().await;
        let data = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserData::seeded(user_id));
        let category = new
            .category_id
            .as_deref()
            .map(|id| data.category(id))
            .transpose()?;

        let now = Utc::now();
        let mut task = Task {
            id: TaskId::new(Uuid::now_v7().to_string()),
            user_id: Some(user_id.to_string()),
            title: new.title,
            description: new.description,
            category_id: new.category_id,
            category_name: None,
            category_color: None,
            category_icon: None,
            tags: new.tags,
            priority: new.priority,
            status: new.status,
            completion_percentage: new.completion_percentage,
            images: new.images,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
        };
        denormalize(&mut task, category);
        data.tasks.push(task.clone());
        Ok(task)
    }

    /// Applies `patch` to one of the user's tasks.
    ///
    /// # Errors
    ///
    /// [`StoreError::Invalid`] for an empty patch or title,
    /// [`StoreError::TaskNotFound`], or [`StoreError::CategoryNotFound`].
    pub async fn update(
        &self,
        user_id: &str,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, StoreError> {
        let mut users = self.users.write().await;
        let data = users.get_mut(user_id).ok_or(StoreError::TaskNotFound)?;
        let index = data
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or(StoreError::TaskNotFound)?;
        patch.validate()?;

        let category = match patch.category_id.as_deref() {
            Some(category_id) => Some(data.category(category_id)?.clone()),
            None => None,
        };

        let task = &mut data.tasks[index];
        patch.apply_to(task);
        if patch.category_id.is_some() {
            denormalize(task, category.as_ref());
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// Removes one of the user's tasks.
    ///
    /// # Errors
    ///
    /// [`StoreError::TaskNotFound`] if the user has no such task.
    pub async fn delete(&self, user_id: &str, id: &TaskId) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let data = users.get_mut(user_id).ok_or(StoreError::TaskNotFound)?;
        let index = data
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or(StoreError::TaskNotFound)?;
        data.tasks.remove(index);
        Ok(())
    }

    /// Canned assistant answer built from the user's tasks.
    pub async fn summary_reply(&self, user_id: &str, message: &str) -> String {
        let tasks = self.list(user_id, &ListFilters::none()).await;
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let (todo, in_progress, done) = (
            count(TaskStatus::Todo),
            count(TaskStatus::InProgress),
            count(TaskStatus::Done),
        );
        let message = message.to_lowercase();
        let words: Vec<&str> = message
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words
            .iter()
            .any(|w| ["hello", "hi", "hey", "merhaba"].contains(w))
        {
            return format!(
                "Hello! You have {} tasks: {done} done, {in_progress} in progress, {todo} to do.",
                tasks.len()
            );
        }

        if words.iter().any(|w| w.starts_with("priorit")) {
            let urgent: Vec<&str> = tasks
                .iter()
                .filter(|t| matches!(t.priority, Priority::High | Priority::Urgent))
                .take(3)
                .map(|t| t.title.as_str())
                .collect();
            return if urgent.is_empty() {
                "None of your tasks is high priority right now.".to_string()
            } else {
                format!("Focus on these first: {}.", urgent.join(", "))
            };
        }

        if tasks.is_empty() {
            "You have no tasks yet. Add one to get started.".to_string()
        } else {
            format!(
                "You have {} tasks; {done} done and {in_progress} in progress.",
                tasks.len()
            )
        }
    }
}
