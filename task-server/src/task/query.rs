//! Filtering, ordering and statistics over a task collection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::task::{Priority, Task};

/// Orderings a list request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    DueDate,
    Priority,
    CreatedAt,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dueDate" => Ok(SortBy::DueDate),
            "priority" => Ok(SortBy::Priority),
            "createdAt" => Ok(SortBy::CreatedAt),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

/// Filters and ordering for a list request. Filters are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub completed: Option<bool>,
    /// Matches the stored priority only; a task without one never matches.
    pub priority: Option<Priority>,
    pub sort_by: Option<SortBy>,
}

impl TaskQuery {
    pub fn matches(&self, task: &Task) -> bool {
        self.completed
            .is_none_or(|completed| task.completed() == completed)
            && self
                .priority
                .is_none_or(|priority| task.priority() == Some(priority))
    }

    /// Filters `tasks`, then sorts them if an ordering was requested.
    ///
    /// Sorting is stable, so equal keys keep their insertion order.
    pub fn apply(&self, tasks: Vec<Task>) -> Vec<Task> {
        let mut tasks: Vec<Task> = tasks.into_iter().filter(|task| self.matches(task)).collect();

        match self.sort_by {
            None => {}
            Some(SortBy::DueDate) => {
                tasks.sort_by(|a, b| compare_due_dates(a.due_date(), b.due_date()))
            }
            Some(SortBy::Priority) => tasks.sort_by_key(|task| task.effective_priority().rank()),
            Some(SortBy::CreatedAt) => tasks.sort_by_key(Task::created_at),
        }
        tasks
    }
}

/// Dated tasks first, ascending; undated tasks last.
fn compare_due_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Aggregate counts over every stored task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    /// Occurrences of each priority present; absent priority counts as medium
    #[schema(value_type = Object)]
    pub priority_counts: BTreeMap<Priority, usize>,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total_tasks = tasks.len();
        let completed_tasks = tasks.iter().filter(|task| task.completed()).count();

        let mut priority_counts = BTreeMap::new();
        for task in tasks {
            *priority_counts.entry(task.effective_priority()).or_insert(0) += 1;
        }

        Self {
            total_tasks,
            completed_tasks,
            pending_tasks: total_tasks - completed_tasks,
            priority_counts,
        }
    }
}
