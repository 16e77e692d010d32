//! In-process [`TaskService`] for testing.
//!
//! Holds tasks in memory and lets a test script failures, override the
//! list body, and hold requests of one operation until released. Every
//! call is counted per [`Operation`] so tests can assert how many requests
//! were issued.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use taskmaster_proto::category::Category;
use taskmaster_proto::task::{ListFilters, NewTask, Task, TaskId, TaskPatch};
use tokio::sync::watch;

use super::{RemoteError, TaskService};

/// The service call a scripted behavior applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_tasks`
    List,
    /// `create_task`
    Create,
    /// `update_task`
    Update,
    /// `delete_task`
    Delete,
    /// `list_categories`
    Categories,
    /// `suggestions`
    Suggestions,
    /// `chat`
    Chat,
}

#[derive(Default)]
struct State {
    /// Newest first, like the backend's list order.
    tasks: Vec<Task>,
    categories: Vec<Category>,
    suggestions: Vec<String>,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    list_body: Option<Value>,
    calls: HashMap<Operation, usize>,
}

/// Scriptable in-memory task service.
pub struct InMemoryTaskService {
    state: Mutex<State>,
    /// Operations whose requests are currently held.
    gate: watch::Sender<HashSet<Operation>>,
}

impl Default for InMemoryTaskService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(HashSet::new());
        Self {
            state: Mutex::new(State::default()),
            gate,
        }
    }

    /// Creates a service pre-populated with `tasks` (kept in the given order).
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let service = Self::new();
        service.state.lock().tasks = tasks;
        service
    }

    /// Current server-side tasks.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Inserts a task as the newest one, bypassing the request path.
    pub fn insert(&self, task: Task) {
        self.state.lock().tasks.insert(0, task);
    }

    /// Sets the categories returned by `list_categories`.
    pub fn set_categories(&self, categories: Vec<Category>) {
        self.state.lock().categories = categories;
    }

    /// Sets the titles returned by `suggestions`.
    pub fn set_suggestions(&self, suggestions: Vec<String>) {
        self.state.lock().suggestions = suggestions;
    }

    /// Makes the next call of `op` fail with `error`. Queued failures are
    /// consumed in order, one per call.
    pub fn fail_next(&self, op: Operation, error: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Returns `body` verbatim from every subsequent `list_tasks` call.
    pub fn set_list_response(&self, body: Value) {
        self.state.lock().list_body = Some(body);
    }

    /// Restores the normal list behavior after [`set_list_response`](Self::set_list_response).
    pub fn clear_list_response(&self) {
        self.state.lock().list_body = None;
    }

    /// Holds requests of `op` until [`resume`](Self::resume) is called for it.
    pub fn pause(&self, op: Operation) {
        self.gate.send_modify(|held| {
            held.insert(op);
        });
    }

    /// Releases held requests of `op`.
    pub fn resume(&self, op: Operation) {
        self.gate.send_modify(|held| {
            held.remove(&op);
        });
    }

    /// Number of calls of `op` received so far, including held ones.
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Counts the call, waits at the gate, then pops a scripted failure.
    async fn enter(&self, op: Operation) -> Result<(), RemoteError> {
        *self.state.lock().calls.entry(op).or_insert(0) += 1;

        let mut rx = self.gate.subscribe();
        loop {
            let paused = rx.borrow_and_update().contains(&op);
            if !paused || rx.changed().await.is_err() {
                break;
            }
        }

        match self
            .state
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn not_found(id: &TaskId) -> RemoteError {
    RemoteError::NotFound(format!("task {id} not found"))
}

impl TaskService for InMemoryTaskService {
    async fn list_tasks(&self, filters: &ListFilters) -> Result<Value, RemoteError> {
        // The body reflects the server state when the request arrived, even
        // if the response is held at the gate.
        let body = {
            let state = self.state.lock();
            match &state.list_body {
                Some(body) => Ok(body.clone()),
                None => {
                    let tasks: Vec<&Task> =
                        state.tasks.iter().filter(|t| filters.matches(t)).collect();
                    serde_json::to_value(tasks).map_err(|e| RemoteError::Decode(e.to_string()))
                }
            }
        };
        self.enter(Operation::List).await?;
        body
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, RemoteError> {
        self.enter(Operation::Create).await?;
        task.validate().map_err(|e| RemoteError::Status {
            status: 422,
            message: e.to_string(),
        })?;

        let mut state = self.state.lock();
        let category = task
            .category_id
            .as_ref()
            .and_then(|id| state.categories.iter().find(|c| &c.id == id));
        let now = Utc::now();
        let created = Task {
            id: TaskId::new(uuid::Uuid::now_v7().to_string()),
            user_id: None,
            title: task.title.clone(),
            description: task.description.clone(),
            category_id: task.category_id.clone(),
            category_name: category.map(|c| c.name.clone()),
            category_color: category.and_then(|c| c.color.clone()),
            category_icon: category.and_then(|c| c.icon.clone()),
            tags: task.tags.clone(),
            priority: task.priority,
            status: task.status,
            completion_percentage: task.completion_percentage,
            images: task.images.clone(),
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(0, created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, RemoteError> {
        self.enter(Operation::Update).await?;
        patch.validate().map_err(|e| RemoteError::Status {
            status: 400,
            message: e.to_string(),
        })?;

        let mut state = self.state.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        patch.apply_to(task);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        self.enter(Operation::Delete).await?;
        let mut state = self.state.lock();
        let index = state
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        state.tasks.remove(index);
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RemoteError> {
        self.enter(Operation::Categories).await?;
        Ok(self.state.lock().categories.clone())
    }

    async fn suggestions(&self) -> Result<Vec<String>, RemoteError> {
        self.enter(Operation::Suggestions).await?;
        Ok(self.state.lock().suggestions.clone())
    }

    async fn chat(&self, message: &str) -> Result<String, RemoteError> {
        self.enter(Operation::Chat).await?;
        Ok(format!("echo: {message}"))
    }
}
