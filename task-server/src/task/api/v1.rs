use crate::task::query::TaskStats;
use crate::task::validation::{
    NewTaskFields, TaskListParams, TaskUpdateFields, ValidationError, request_body,
    validate_query,
};
use crate::task::{Task, TaskService, TaskServiceError};
use crate::web::api::ErrorResponse;
use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;

/// Shared state of the task routes.
#[derive(Clone, Debug)]
pub struct TaskState {
    pub service: TaskService,
}

impl TaskState {
    pub fn new(service: TaskService) -> Self {
        Self { service }
    }
}

/// API response for a successful delete.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    success: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps a service error to its status code and client-facing message.
///
/// Storage failures are logged in full but reported with `failure_message` only.
fn error_response(err: TaskServiceError, failure_message: &str) -> ApiError {
    match err {
        TaskServiceError::Validation(err) => {
            tracing::warn!(field = ?err.field(), "Rejected request: {}", err);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(err.to_string())),
            )
        }
        TaskServiceError::NotFound(id) => {
            tracing::warn!("Task {} not found", id);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Task not found".to_string())),
            )
        }
        TaskServiceError::Storage(err) => {
            tracing::error!("{}: {}", failure_message, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(failure_message.to_string())),
            )
        }
    }
}

fn malformed_request(detail: String) -> ApiError {
    error_response(
        ValidationError::MalformedRequest(detail).into(),
        "Malformed request",
    )
}

/// Handler for GET /tasks - Returns the tasks matching the query.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/tasks",
    params(TaskListParams),
    responses(
        (status = 200, description = "Successfully retrieved tasks", body = Vec<Task>),
        (status = 400, description = "Invalid query parameter", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_tasks_handler(
    State(state): State<Arc<TaskState>>,
    params: Result<Query<TaskListParams>, QueryRejection>,
) -> Result<Json<Vec<Task>>, ApiError> {
    const FAILURE: &str = "Failed to fetch tasks";

    let Query(params) = params.map_err(|rejection| malformed_request(rejection.body_text()))?;
    let query = validate_query(&params).map_err(|err| error_response(err.into(), FAILURE))?;

    state
        .service
        .list_tasks(&query)
        .await
        .map(Json)
        .map_err(|err| error_response(err, FAILURE))
}

/// Handler for GET /tasks/stats - Returns counts over all tasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/tasks/stats",
    responses(
        (status = 200, description = "Successfully computed statistics", body = TaskStats),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_task_stats_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<TaskStats>, ApiError> {
    state
        .service
        .task_stats()
        .await
        .map(Json)
        .map_err(|err| error_response(err, "Failed to fetch task statistics"))
}

/// Handler for POST /tasks - Creates a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = NewTaskFields,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid task data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    const FAILURE: &str = "Failed to create task";

    let Json(body) = payload.map_err(|rejection| malformed_request(rejection.body_text()))?;
    let fields: NewTaskFields =
        request_body(body).map_err(|err| error_response(err.into(), FAILURE))?;

    let task = state
        .service
        .create_task(&fields)
        .await
        .map_err(|err| error_response(err, FAILURE))?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Handler for PUT /tasks/{id} - Applies a partial update to a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(
        ("id" = String, Path, description = "ID of the task to update")
    ),
    request_body = TaskUpdateFields,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Invalid task data", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    const FAILURE: &str = "Failed to update task";

    let Json(body) = payload.map_err(|rejection| malformed_request(rejection.body_text()))?;
    let fields: TaskUpdateFields =
        request_body(body).map_err(|err| error_response(err.into(), FAILURE))?;

    state
        .service
        .update_task(&id, &fields)
        .await
        .map(Json)
        .map_err(|err| error_response(err, FAILURE))
}

/// Handler for DELETE /tasks/{id} - Deletes a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(
        ("id" = String, Path, description = "ID of the task to delete")
    ),
    responses(
        (status = 200, description = "Task deleted", body = DeleteResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .service
        .delete_task(&id)
        .await
        .map(|_| Json(DeleteResponse { success: true }))
        .map_err(|err| error_response(err, "Failed to delete task"))
}

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(get_tasks_handler).post(create_task_handler))
        .route("/tasks/stats", get(get_task_stats_handler))
        .route(
            "/tasks/{id}",
            put(update_task_handler).delete(delete_task_handler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::store::{MockTaskStore, StorageError};

    fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let (status, Json(body)) = err;
        (status, serde_json::to_value(body).unwrap())
    }

    #[test]
    fn can_hide_storage_details_from_clients() {
        let err = TaskServiceError::Storage(StorageError::Malformed {
            path: "/srv/data.json".into(),
            reason: "EOF while parsing".to_string(),
        });

        let (status, body) = body_json(error_response(err, "Failed to fetch tasks"));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Failed to fetch tasks"}));
    }

    #[test]
    fn can_map_not_found_to_404() {
        let err = TaskServiceError::NotFound("abc".to_string());

        let (status, body) = body_json(error_response(err, "Failed to update task"));

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "Task not found"}));
    }

    #[tokio::test]
    async fn can_return_500_when_store_fails() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let mut store = MockTaskStore::new();
        store.expect_load().returning(|| {
            Err(StorageError::Io {
                path: "data.json".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        });
        let state = Arc::new(TaskState::new(TaskService::new(Arc::new(store))));
        let app = create_api_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/tasks/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": "Failed to fetch task statistics"})
        );
    }
}
