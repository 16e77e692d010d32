//! Sync controller: the only component that talks to the task service.
//!
//! Owns the [`TaskCache`] and applies the store's consistency rules:
//!
//! - at most one user-initiated refresh in flight; overlapping calls get
//!   the current snapshot back instead of issuing a second request
//! - every list request carries a generation token and only responses
//!   newer than the last applied one reach the cache
//! - create and update refresh after success instead of inserting locally
//! - delete removes the task locally first and settles in the background
//!
//! The cache lock is a `parking_lot::Mutex` held only between suspension
//! points, never across an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskmaster_proto::api;
use taskmaster_proto::category::Category;
use taskmaster_proto::task::{ListFilters, NewTask, Task, TaskId, TaskPatch};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::SyncError;
use super::cache::{Snapshot, TaskCache};
use crate::remote::{RemoteError, TaskService};

/// Default bound on every service call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What happens to an optimistically removed task when its delete fails
/// for a reason other than "not found".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Leave it removed until the follow-up refresh brings it back.
    #[default]
    KeepRemoved,
    /// Put it back into the cache right away.
    RollBack,
}

/// Tunables of a [`SyncController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Bound on every service call; exceeding it fails with a timeout.
    pub request_timeout: Duration,
    /// Reaction to a failed delete.
    pub delete_policy: DeletePolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            delete_policy: DeletePolicy::default(),
        }
    }
}

/// Why a list request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Caller asked for it; deduplicated against an in-flight fetch.
    User,
    /// Follows a confirmed create or update.
    AfterWrite,
    /// Follows a failed delete; keeps that error visible on success.
    Recovery,
}

#[derive(Debug, Clone, Copy)]
enum DeleteMark {
    /// Request not answered yet.
    Pending,
    /// Confirmed by the server once every list request up to and
    /// including generation `through` had been issued.
    Settled { through: u64 },
}

struct State {
    cache: TaskCache,
    /// Generation of the most recently issued list request.
    issued: u64,
    /// Generation of the most recently applied list response.
    applied: u64,
    deletes: HashMap<TaskId, DeleteMark>,
    last_filters: ListFilters,
    /// Bumped by every reset. Writes started under an older session only
    /// release their in-flight count when they finish.
    session: u64,
}

impl State {
    fn new() -> Self {
        Self {
            cache: TaskCache::new(),
            issued: 0,
            applied: 0,
            deletes: HashMap::new(),
            last_filters: ListFilters::none(),
            session: 0,
        }
    }

    /// Drops tasks a list response of generation `token` may still carry
    /// although they were deleted, and forgets marks it has outgrown.
    fn without_deleted(&mut self, tasks: Vec<Task>, token: u64) -> Vec<Task> {
        self.deletes.retain(|_, mark| match mark {
            DeleteMark::Pending => true,
            DeleteMark::Settled { through } => token <= *through,
        });
        if self.deletes.is_empty() {
            return tasks;
        }
        tasks
            .into_iter()
            .filter(|t| !self.deletes.contains_key(&t.id))
            .collect()
    }

    /// Forgets settled marks once no list request that could predate them
    /// is still in flight.
    fn prune_settled(&mut self) {
        if !self.cache.is_fetching() {
            self.deletes
                .retain(|_, mark| matches!(mark, DeleteMark::Pending));
        }
    }
}

struct Inner<S> {
    service: S,
    options: SyncOptions,
    state: Mutex<State>,
    updates: watch::Sender<Snapshot>,
}

/// Handle to the task store of one session.
///
/// Cloning is cheap; every clone drives the same cache.
pub struct SyncController<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SyncController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Background half of a [`SyncController::delete_task`] call.
#[derive(Debug)]
pub struct PendingDelete {
    task_id: TaskId,
    handle: JoinHandle<Result<(), SyncError>>,
}

impl PendingDelete {
    /// The task being deleted.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Waits for the server's answer and, on failure, the follow-up refresh.
    ///
    /// # Errors
    ///
    /// Returns the classified error of a failed delete. "Not found" counts
    /// as success.
    pub async fn wait(self) -> Result<(), SyncError> {
        self.handle.await.unwrap_or_else(|e| {
            Err(SyncError::Server {
                status: None,
                message: format!("delete task aborted: {e}"),
            })
        })
    }
}

impl<S: TaskService + 'static> SyncController<S> {
    /// Creates a controller with default options.
    pub fn new(service: S) -> Self {
        Self::with_options(service, SyncOptions::default())
    }

    /// Creates a controller with the given options.
    pub fn with_options(service: S, options: SyncOptions) -> Self {
        let (updates, _) = watch::channel(Snapshot::default());
        Self {
            inner: Arc::new(Inner {
                service,
                options,
                state: Mutex::new(State::new()),
                updates,
            }),
        }
    }

    /// The underlying service.
    pub fn service(&self) -> &S {
        &self.inner.service
    }

    /// Timeout and delete policy this controller was built with.
    pub fn options(&self) -> &SyncOptions {
        &self.inner.options
    }

    /// Current snapshot. Never blocks on the network.
    #[must_use]
    pub fn read(&self) -> Snapshot {
        self.inner.state.lock().cache.read()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.updates.subscribe()
    }

    /// Fetches the task list and replaces the cache with it.
    ///
    /// If a refresh is already in flight, returns the current tasks without
    /// issuing a request. On failure the cache is emptied, the classified
    /// error recorded, and an empty list returned. Never fails.
    pub async fn refresh(&self, filters: &ListFilters) -> Arc<[Task]> {
        self.fetch(filters, Trigger::User, None).await
    }

    /// Creates a task on the server, then refreshes.
    ///
    /// The task is not inserted locally; it appears once the refresh that
    /// follows has been applied.
    ///
    /// # Errors
    ///
    /// Returns the classified failure, which is also recorded in the cache.
    pub async fn create_task(&self, task: &NewTask) -> Result<Task, SyncError> {
        let session = self.begin_op();
        let result = self.call(self.inner.service.create_task(task)).await;
        let created = self.finish_op(result, session, "create task")?;
        tracing::info!(task_id = %created.id, "task created");

        self.fetch(&self.last_filters(), Trigger::AfterWrite, Some(session))
            .await;
        Ok(created)
    }

    /// Applies a partial update on the server, then refreshes.
    ///
    /// # Errors
    ///
    /// Returns the classified failure, which is also recorded in the cache.
    pub async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, SyncError> {
        let session = self.begin_op();
        let result = self.call(self.inner.service.update_task(id, patch)).await;
        let updated = self.finish_op(result, session, "update task")?;
        tracing::info!(task_id = %id, "task updated");

        self.fetch(&self.last_filters(), Trigger::AfterWrite, Some(session))
            .await;
        Ok(updated)
    }

    /// Removes the task from the cache and deletes it on the server in the
    /// background.
    ///
    /// The removal is visible to [`read`](Self::read) before this returns.
    /// Returns `None` without issuing a request if a delete of the same id
    /// is still pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn delete_task(&self, id: &TaskId) -> Option<PendingDelete> {
        let (removed, session) = {
            let mut state = self.inner.state.lock();
            if matches!(state.deletes.get(id), Some(DeleteMark::Pending)) {
                tracing::debug!(task_id = %id, "delete already pending");
                return None;
            }
            state.deletes.insert(id.clone(), DeleteMark::Pending);
            let removed = state.cache.remove(id);
            state.cache.begin_op();
            self.publish(&state);
            (removed, state.session)
        };

        let controller = self.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            controller.finish_delete(task_id, removed, session).await
        });
        Some(PendingDelete {
            task_id: id.clone(),
            handle,
        })
    }

    /// Suggested task titles. Best effort: empty on any failure, and the
    /// cache is left untouched.
    pub async fn suggestions(&self) -> Vec<String> {
        match self.call(self.inner.service.suggestions()).await {
            Ok(titles) => titles,
            Err(e) => {
                tracing::warn!(error = %e, "suggestions unavailable");
                Vec::new()
            }
        }
    }

    /// The user's categories. Does not touch the cache.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    pub async fn categories(&self) -> Result<Vec<Category>, SyncError> {
        self.call(self.inner.service.list_categories())
            .await
            .map_err(SyncError::from)
    }

    /// One assistant exchange. Does not touch the cache.
    ///
    /// # Errors
    ///
    /// Returns the classified failure.
    pub async fn chat(&self, message: &str) -> Result<String, SyncError> {
        self.call(self.inner.service.chat(message))
            .await
            .map_err(SyncError::from)
    }

    /// Clears the recorded error.
    pub fn clear_error(&self) {
        let mut state = self.inner.state.lock();
        state.cache.clear_error();
        self.publish(&state);
    }

    /// Forgets everything about the session (tasks, error, pending deletes).
    ///
    /// Responses to requests issued before the reset are discarded: list
    /// responses are not applied, and writes still in flight neither record
    /// errors, restore tasks, nor trigger refreshes when they finish.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.session += 1;
        state.cache.clear();
        state.cache.clear_error();
        state.deletes.clear();
        state.applied = state.issued;
        state.last_filters = ListFilters::none();
        self.publish(&state);
        tracing::info!("session reset");
    }

    fn last_filters(&self) -> ListFilters {
        self.inner.state.lock().last_filters.clone()
    }

    fn publish(&self, state: &State) -> Snapshot {
        let snapshot = state.cache.read();
        self.inner.updates.send_replace(snapshot.clone());
        snapshot
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        tokio::time::timeout(self.inner.options.request_timeout, request)
            .await
            .unwrap_or(Err(RemoteError::Timeout))
    }

    /// Marks a write in flight and returns the session it belongs to.
    fn begin_op(&self) -> u64 {
        let mut state = self.inner.state.lock();
        state.cache.begin_op();
        self.publish(&state);
        state.session
    }

    fn finish_op<T>(
        &self,
        result: Result<T, RemoteError>,
        session: u64,
        op: &str,
    ) -> Result<T, SyncError> {
        let mut state = self.inner.state.lock();
        state.cache.end_op();
        if state.session != session {
            tracing::debug!(op, "session reset while in flight, result not recorded");
            self.publish(&state);
            return result.map_err(SyncError::from);
        }
        let outcome = match result {
            Ok(value) => {
                state.cache.clear_error();
                Ok(value)
            }
            Err(e) => {
                let error = SyncError::from(e);
                tracing::warn!(op, error = %error, "operation failed");
                if matches!(error, SyncError::Unauthorized(_)) {
                    state.cache.clear();
                }
                state.cache.set_error(error.clone());
                Err(error)
            }
        };
        self.publish(&state);
        outcome
    }

    /// Issues one list request. With `session` set, nothing is issued if
    /// that session has been reset.
    async fn fetch(
        &self,
        filters: &ListFilters,
        trigger: Trigger,
        session: Option<u64>,
    ) -> Arc<[Task]> {
        let token = {
            let mut state = self.inner.state.lock();
            if session.is_some_and(|s| s != state.session) {
                tracing::debug!(?trigger, "session reset, skipping refresh");
                return state.cache.read().shared_tasks();
            }
            if trigger == Trigger::User && state.cache.is_fetching() {
                tracing::debug!("refresh already in flight, returning current snapshot");
                return state.cache.read().shared_tasks();
            }
            state.issued += 1;
            state.last_filters = filters.clone();
            state.cache.begin_fetch();
            self.publish(&state);
            state.issued
        };

        let result = self.call(self.inner.service.list_tasks(filters)).await;

        let mut state = self.inner.state.lock();
        state.cache.end_fetch();
        if token <= state.applied {
            tracing::debug!(token, applied = state.applied, "discarding stale list response");
            state.prune_settled();
            return self.publish(&state).shared_tasks();
        }
        state.applied = token;

        match result {
            Ok(body) => {
                let tasks = parse_task_list(body);
                let tasks = state.without_deleted(tasks, token);
                tracing::debug!(token, count = tasks.len(), "task list applied");
                state.cache.replace(tasks);
                if trigger != Trigger::Recovery {
                    state.cache.clear_error();
                }
            }
            Err(RemoteError::Decode(reason)) => {
                tracing::warn!(%reason, "unreadable list response, treating as empty");
                state.cache.clear();
                if trigger != Trigger::Recovery {
                    state.cache.clear_error();
                }
            }
            Err(e) => {
                let error = SyncError::from(e);
                tracing::warn!(error = %error, kind = %error.kind(), "refresh failed");
                state.cache.clear();
                state.cache.set_error(error);
            }
        }
        state.prune_settled();
        self.publish(&state).shared_tasks()
    }

    async fn finish_delete(
        self,
        id: TaskId,
        removed: Option<(usize, Task)>,
        session: u64,
    ) -> Result<(), SyncError> {
        let result = self.call(self.inner.service.delete_task(&id)).await;

        let outcome = {
            let mut state = self.inner.state.lock();
            state.cache.end_op();
            if state.session != session {
                tracing::debug!(task_id = %id, "session reset while delete in flight");
                self.publish(&state);
                return match result {
                    Ok(()) | Err(RemoteError::NotFound(_)) => Ok(()),
                    Err(e) => Err(SyncError::from(e)),
                };
            }
            let outcome = match result {
                Ok(()) | Err(RemoteError::NotFound(_)) => {
                    let through = state.issued;
                    state.deletes.insert(id.clone(), DeleteMark::Settled { through });
                    state.prune_settled();
                    state.cache.clear_error();
                    tracing::info!(task_id = %id, "task deleted");
                    Ok(())
                }
                Err(e) => {
                    let error = SyncError::from(e);
                    tracing::warn!(task_id = %id, error = %error, "delete failed");
                    state.deletes.remove(&id);
                    if matches!(error, SyncError::Unauthorized(_)) {
                        state.cache.clear();
                    } else if self.inner.options.delete_policy == DeletePolicy::RollBack
                        && let Some((index, task)) = removed
                    {
                        state.cache.restore(index, task);
                    }
                    state.cache.set_error(error.clone());
                    Err(error)
                }
            };
            self.publish(&state);
            outcome
        };

        if outcome.is_err() {
            self.fetch(&self.last_filters(), Trigger::Recovery, Some(session))
                .await;
        }
        outcome
    }
}

/// Extracts tasks from a list body: a bare array, or an object holding the
/// array under `"tasks"`. Anything else is empty. Elements that are not
/// valid tasks are skipped.
fn parse_task_list(body: Value) -> Vec<Task> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut fields) => match fields.remove(api::TASKS_FIELD) {
            Some(Value::Array(items)) => items,
            _ => {
                tracing::warn!("list response has no task array, treating as empty");
                return Vec::new();
            }
        },
        other => {
            tracing::warn!(body = %other, "unexpected list response shape, treating as empty");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Task>(item) {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable task in list response");
                None
            }
        })
        .collect()
}
