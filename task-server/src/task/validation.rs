//! Field checks for task data arriving from clients.
//!
//! Request bodies are accepted as loosely typed JSON so that a wrong type
//! (a numeric title, a string `completed`) is reported with the same
//! field-specific message as a bad value.

use chrono::{DateTime, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::task::Priority;
use crate::task::query::{SortBy, TaskQuery};

/// A rejected field or parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title is required and must be a non-empty string")]
    MissingTitle,
    #[error("Title must be a non-empty string")]
    InvalidTitle,
    #[error("Invalid due date format")]
    InvalidDueDate,
    #[error("Priority must be one of: low, medium, high")]
    InvalidPriority,
    #[error("Completed must be a boolean")]
    InvalidCompleted,
    #[error("Invalid value '{value}' for query parameter '{name}'")]
    InvalidQueryParameter { name: &'static str, value: String },
    #[error("Invalid request: {0}")]
    MalformedRequest(String),
}

impl ValidationError {
    /// Name of the offending field, when the error concerns a single field.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::MissingTitle | ValidationError::InvalidTitle => Some("title"),
            ValidationError::InvalidDueDate => Some("dueDate"),
            ValidationError::InvalidPriority => Some("priority"),
            ValidationError::InvalidCompleted => Some("completed"),
            ValidationError::InvalidQueryParameter { name, .. } => Some(*name),
            ValidationError::MalformedRequest(_) => None,
        }
    }
}

/// A field of a partial update: omitted, explicitly cleared with `null`, or set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Absent,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Absent
    }
}

// Only called for keys present in the input; `#[serde(default)]` covers the rest.
impl<'de, T> Deserialize<'de> for FieldUpdate<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        })
    }
}

/// Body of a create request.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskFields {
    /// Required, non-empty after trimming
    #[serde(default)]
    #[schema(value_type = String)]
    pub title: Option<Value>,
    /// Calendar date, `YYYY-MM-DD`
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: Option<Value>,
    /// Defaults to `medium`
    #[serde(default)]
    #[schema(value_type = Option<Priority>)]
    pub priority: Option<Value>,
}

/// Body of an update request. Unknown keys are ignored.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateFields {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub title: FieldUpdate<Value>,
    #[serde(default)]
    #[schema(value_type = Option<bool>)]
    pub completed: FieldUpdate<Value>,
    /// `null` removes the due date
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: FieldUpdate<Value>,
    #[serde(default)]
    #[schema(value_type = Option<Priority>)]
    pub priority: FieldUpdate<Value>,
}

/// Query string of a list request.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaskListParams {
    /// `true` or `false`
    pub completed: Option<String>,
    /// `low`, `medium` or `high`
    pub priority: Option<String>,
    /// `dueDate`, `priority` or `createdAt`
    pub sort_by: Option<String>,
}

/// A validated create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
}

/// A validated update request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub due_date: FieldUpdate<NaiveDate>,
    pub priority: Option<Priority>,
}

/// Decodes a create or update body. Only a JSON object is accepted.
pub fn request_body<T: DeserializeOwned>(body: Value) -> Result<T, ValidationError> {
    if !body.is_object() {
        return Err(ValidationError::MalformedRequest(
            "request body must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(body).map_err(|e| ValidationError::MalformedRequest(e.to_string()))
}

/// Parses a due date written as `YYYY-MM-DD` or as an RFC 3339 date-time.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn trimmed_title(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

fn due_date(value: &Value) -> Result<NaiveDate, ValidationError> {
    value
        .as_str()
        .and_then(parse_due_date)
        .ok_or(ValidationError::InvalidDueDate)
}

fn priority(value: &Value) -> Result<Priority, ValidationError> {
    value
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .ok_or(ValidationError::InvalidPriority)
}

/// On create, an empty string counts as "not provided".
fn provided(value: &Option<Value>) -> Option<&Value> {
    value
        .as_ref()
        .filter(|value| value.as_str() != Some(""))
}

/// Checks the fields of a create request.
pub fn validate_new_task(fields: &NewTaskFields) -> Result<NewTask, ValidationError> {
    let title = fields
        .title
        .as_ref()
        .and_then(trimmed_title)
        .ok_or(ValidationError::MissingTitle)?;
    let due_date = provided(&fields.due_date).map(due_date).transpose()?;
    let priority = provided(&fields.priority)
        .map(priority)
        .transpose()?
        .unwrap_or_default();

    Ok(NewTask {
        title,
        due_date,
        priority,
    })
}

/// Checks the fields of an update request.
///
/// Only `dueDate` may be cleared; `null` for any other field is rejected.
pub fn validate_changes(fields: &TaskUpdateFields) -> Result<TaskChanges, ValidationError> {
    let title = match &fields.title {
        FieldUpdate::Absent => None,
        FieldUpdate::Clear => return Err(ValidationError::InvalidTitle),
        FieldUpdate::Set(value) => {
            Some(trimmed_title(value).ok_or(ValidationError::InvalidTitle)?)
        }
    };

    let completed = match &fields.completed {
        FieldUpdate::Absent => None,
        FieldUpdate::Set(Value::Bool(completed)) => Some(*completed),
        FieldUpdate::Clear | FieldUpdate::Set(_) => {
            return Err(ValidationError::InvalidCompleted);
        }
    };

    let due_date = match &fields.due_date {
        FieldUpdate::Absent => FieldUpdate::Absent,
        FieldUpdate::Clear => FieldUpdate::Clear,
        FieldUpdate::Set(value) => FieldUpdate::Set(due_date(value)?),
    };

    let priority = match &fields.priority {
        FieldUpdate::Absent => None,
        FieldUpdate::Clear => return Err(ValidationError::InvalidPriority),
        FieldUpdate::Set(value) => Some(priority(value)?),
    };

    Ok(TaskChanges {
        title,
        completed,
        due_date,
        priority,
    })
}

fn query_parameter<T>(
    name: &'static str,
    raw: &Option<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ValidationError> {
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidQueryParameter {
                name,
                value: value.to_string(),
            }),
    }
}

/// Checks the query string of a list request. Empty values mean "not given".
pub fn validate_query(params: &TaskListParams) -> Result<TaskQuery, ValidationError> {
    Ok(TaskQuery {
        completed: query_parameter("completed", &params.completed, |raw| match raw {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        })?,
        priority: query_parameter("priority", &params.priority, |raw| raw.parse().ok())?,
        sort_by: query_parameter("sortBy", &params.sort_by, |raw| {
            raw.parse::<SortBy>().ok()
        })?,
    })
}
