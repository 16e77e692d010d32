//! Read-only projections of a task snapshot.
//!
//! Everything here is a pure function of its input: same tasks and same
//! filter in, same output out. Nothing is cached between calls.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use taskmaster_proto::task::{ParseEnumError, Task, TaskStatus};

/// Status selector for [`filter_by_status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    /// Every task.
    #[default]
    All,
    /// Only tasks with this status.
    Only(TaskStatus),
}

impl StatusFilter {
    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Only(status) => task.status == status,
        }
    }
}

impl From<TaskStatus> for StatusFilter {
    fn from(status: TaskStatus) -> Self {
        Self::Only(status)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Only(status) => write!(f, "{status}"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

/// Tasks passing `filter`, in their original relative order.
#[must_use]
pub fn filter_by_status(tasks: &[Task], filter: StatusFilter) -> Vec<&Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

/// Tasks whose resolved category name equals `name`.
#[must_use]
pub fn filter_by_category<'a>(tasks: &'a [Task], name: &str) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.resolved_category() == name)
        .collect()
}

/// Tasks sharing one resolved category name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryAggregate<'a> {
    pub name: &'a str,
    /// Member count.
    pub count: usize,
    /// Members whose status is done.
    pub completed: usize,
    /// Members in snapshot order.
    pub tasks: Vec<&'a Task>,
}

impl CategoryAggregate<'_> {
    /// Share of done members, rounded down, in percent.
    #[must_use]
    pub const fn completion_percent(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.completed * 100 / self.count
        }
    }
}

/// Groups tasks by resolved category name.
///
/// Categories come out in order of first appearance in `tasks`.
#[must_use]
pub fn category_aggregates(tasks: &[Task]) -> Vec<CategoryAggregate<'_>> {
    let mut aggregates: Vec<CategoryAggregate<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for task in tasks {
        let name = task.resolved_category();
        let slot = *index.entry(name).or_insert_with(|| {
            aggregates.push(CategoryAggregate {
                name,
                count: 0,
                completed: 0,
                tasks: Vec::new(),
            });
            aggregates.len() - 1
        });
        let aggregate = &mut aggregates[slot];
        aggregate.count += 1;
        if task.is_done() {
            aggregate.completed += 1;
        }
        aggregate.tasks.push(task);
    }

    aggregates
}

/// Task totals per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

#[must_use]
pub fn status_counts(tasks: &[Task]) -> StatusCounts {
    tasks
        .iter()
        .fold(StatusCounts::default(), |mut counts, task| {
            counts.total += 1;
            match task.status {
                TaskStatus::Todo => counts.todo += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Done => counts.done += 1,
            }
            counts
        })
}
