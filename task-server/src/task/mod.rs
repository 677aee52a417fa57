//! Tasks and the service that manages them.
//!
//! A [`TaskService`] runs every operation as one load → compute → save cycle
//! against a [`TaskStore`]. Incoming fields are checked by the
//! [`validation`] module and list/stats requests are answered by the
//! [`query`] module.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use utoipa::ToSchema;

pub mod api;
pub mod query;
pub mod store;
pub mod validation;

use self::query::{TaskQuery, TaskStats};
use self::store::{StorageError, TaskStore};
use self::validation::{
    FieldUpdate, NewTaskFields, TaskUpdateFields, ValidationError, validate_changes,
    validate_new_task,
};

/// Urgency of a task.
///
/// Variants are declared from most to least urgent, so the derived ordering
/// sorts `high` first.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort rank: high(1) < medium(2) < low(3).
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority '{0}'")]
pub struct UnknownPriority(String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(UnknownPriority(other.to_string())),
        }
    }
}

/// A single to-do item.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier assigned at creation
    id: String,
    /// Trimmed, non-empty title
    title: String,
    completed: bool,
    /// Calendar date the task is due, if any
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_due_date"
    )]
    due_date: Option<NaiveDate>,
    /// Stored priority; absent is treated as medium when sorting or counting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<Priority>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    fn create(id: String, fields: validation::NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: fields.title,
            completed: false,
            due_date: fields.due_date,
            priority: Some(fields.priority),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    /// Returns the priority as stored, which may be absent.
    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Returns the priority used for ranking and statistics.
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn apply(&mut self, changes: validation::TaskChanges, now: DateTime<Utc>) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(completed) = changes.completed {
            self.completed = completed;
        }
        match changes.due_date {
            FieldUpdate::Absent => {}
            FieldUpdate::Clear => self.due_date = None,
            FieldUpdate::Set(due_date) => self.due_date = Some(due_date),
        }
        if let Some(priority) = changes.priority {
            self.priority = Some(priority);
        }
        self.updated_at = now.max(self.updated_at);
    }
}

fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => validation::parse_due_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid due date '{raw}'"))),
    }
}

/// The full, ordered set of tasks held in one document.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCollection {
    tasks: Vec<Task>,
}

impl TaskCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.iter().any(|task| task.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    fn remove(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|task| task.id == id)?;
        Some(self.tasks.remove(index))
    }

    /// Returns the first id that occurs more than once, if any.
    pub fn duplicate_id(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.tasks
            .iter()
            .map(|task| task.id.as_str())
            .find(|id| !seen.insert(*id))
    }
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// The request carried an invalid field or parameter.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No task has the requested ID.
    #[error("Task with ID {0} not found")]
    NotFound(String),
    /// The task document could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Creates, edits, deletes and queries tasks held by a [`TaskStore`].
///
/// Operations are serialized so that one request's load/save pair never
/// interleaves with another's inside this process.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    guard: Arc<Mutex<()>>,
    clock: Clock,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            guard: Arc::new(Mutex::new(())),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the source of "now" used for timestamps.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Lists tasks matching the query, in the order the query asks for.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, TaskServiceError> {
        let _guard = self.guard.lock().await;
        let collection = self.store.load().await?;
        Ok(query.apply(collection.into_tasks()))
    }

    /// Computes statistics over every stored task.
    #[tracing::instrument(skip(self))]
    pub async fn task_stats(&self) -> Result<TaskStats, TaskServiceError> {
        let _guard = self.guard.lock().await;
        let collection = self.store.load().await?;
        Ok(TaskStats::from_tasks(collection.tasks()))
    }

    /// Creates a new task.
    ///
    /// # Arguments
    ///
    /// * `fields` - The title and optional due date and priority of the task.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `Task` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(&self, fields: &NewTaskFields) -> Result<Task, TaskServiceError> {
        let new_task = validate_new_task(fields)?;

        let _guard = self.guard.lock().await;
        let mut collection = self.store.load().await?;

        let mut id = uuid::Uuid::new_v4().to_string();
        while collection.contains(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        let task = Task::create(id, new_task, (self.clock)());

        collection.push(task.clone());
        self.store.save(&collection).await?;
        tracing::info!("Created task {}", task.id);
        Ok(task)
    }

    /// Applies a partial update to a task by its ID.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the task to update.
    /// * `fields` - The fields to change; omitted fields are left untouched.
    ///
    /// # Returns
    ///
    /// A `Result` containing the updated `Task` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn update_task(
        &self,
        id: &str,
        fields: &TaskUpdateFields,
    ) -> Result<Task, TaskServiceError> {
        let _guard = self.guard.lock().await;
        let mut collection = self.store.load().await?;

        let task = collection
            .get_mut(id)
            .ok_or_else(|| TaskServiceError::NotFound(id.to_string()))?;
        let changes = validate_changes(fields)?;
        task.apply(changes, (self.clock)());
        let updated = task.clone();

        self.store.save(&collection).await?;
        tracing::info!("Updated task {}", updated.id);
        Ok(updated)
    }

    /// Deletes a task by its ID.
    ///
    /// # Returns
    ///
    /// A `Result` containing the deleted `Task` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: &str) -> Result<Task, TaskServiceError> {
        let _guard = self.guard.lock().await;
        let mut collection = self.store.load().await?;

        let deleted = collection
            .remove(id)
            .ok_or_else(|| TaskServiceError::NotFound(id.to_string()))?;

        self.store.save(&collection).await?;
        tracing::info!("Deleted task {}", deleted.id);
        Ok(deleted)
    }
}

impl fmt::Debug for TaskService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskService").finish_non_exhaustive()
    }
}
