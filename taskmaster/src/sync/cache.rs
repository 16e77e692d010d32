//! The task cache and the snapshots it hands out.
//!
//! [`TaskCache`] is plain data with no I/O and no locking of its own; the
//! sync controller owns it and serializes access. Readers only ever see a
//! [`Snapshot`], which shares the task list by reference count.

use std::collections::HashSet;
use std::sync::Arc;

use taskmaster_proto::task::{Task, TaskId};

use super::SyncError;

/// Immutable point-in-time view of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    tasks: Arc<[Task]>,
    busy: bool,
    error: Option<SyncError>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            tasks: Arc::from(Vec::new()),
            busy: false,
            error: None,
        }
    }
}

impl Snapshot {
    /// The tasks, in the order the server listed them.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Shared handle to the task list.
    #[must_use]
    pub fn shared_tasks(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    /// Whether any request was in flight when the snapshot was taken.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Error of the most recent failed operation, if not yet cleared.
    #[must_use]
    pub const fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether a task with `id` is present.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}

/// Last authoritative task list plus session status.
#[derive(Debug)]
pub struct TaskCache {
    tasks: Arc<[Task]>,
    fetches_in_flight: usize,
    ops_in_flight: usize,
    error: Option<SyncError>,
}

impl Default for TaskCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Arc::from(Vec::new()),
            fetches_in_flight: 0,
            ops_in_flight: 0,
            error: None,
        }
    }

    /// Swaps in a whole new task list.
    ///
    /// Later duplicates of an id are dropped so the cache stays unique by id.
    pub fn replace(&mut self, tasks: Vec<Task>) {
        let mut seen = HashSet::with_capacity(tasks.len());
        let unique: Vec<Task> = tasks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        self.tasks = Arc::from(unique);
    }

    /// Removes one task, returning it with its former position.
    pub fn remove(&mut self, id: &TaskId) -> Option<(usize, Task)> {
        let index = self.tasks.iter().position(|t| &t.id == id)?;
        let mut tasks = self.tasks.to_vec();
        let removed = tasks.remove(index);
        self.tasks = Arc::from(tasks);
        Some((index, removed))
    }

    /// Puts a previously removed task back near its old position.
    ///
    /// No-op if a task with the same id has reappeared meanwhile.
    pub fn restore(&mut self, index: usize, task: Task) {
        if self.tasks.iter().any(|t| t.id == task.id) {
            return;
        }
        let mut tasks = self.tasks.to_vec();
        tasks.insert(index.min(tasks.len()), task);
        self.tasks = Arc::from(tasks);
    }

    /// Drops every task.
    pub fn clear(&mut self) {
        self.tasks = Arc::from(Vec::new());
    }

    /// Current snapshot. Never blocks on I/O.
    #[must_use]
    pub fn read(&self) -> Snapshot {
        Snapshot {
            tasks: Arc::clone(&self.tasks),
            busy: self.is_busy(),
            error: self.error.clone(),
        }
    }

    pub fn set_error(&mut self, error: SyncError) {
        self.error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub const fn begin_fetch(&mut self) {
        self.fetches_in_flight += 1;
    }

    pub const fn end_fetch(&mut self) {
        self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
    }

    pub const fn begin_op(&mut self) {
        self.ops_in_flight += 1;
    }

    pub const fn end_op(&mut self) {
        self.ops_in_flight = self.ops_in_flight.saturating_sub(1);
    }

    /// Whether a list request is in flight.
    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        self.fetches_in_flight > 0
    }

    /// Whether any request is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.fetches_in_flight > 0 || self.ops_in_flight > 0
    }
}
