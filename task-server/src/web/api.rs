use std::sync::Arc;

use crate::task::api::v1::{self, TaskState};

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

/// JSON response for API errors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable description of what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: String) -> Self {
        Self { error }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        v1::get_tasks_handler,
        v1::get_task_stats_handler,
        v1::create_task_handler,
        v1::update_task_handler,
        v1::delete_task_handler,
    ),
    components(schemas(
        crate::task::Task,
        crate::task::Priority,
        crate::task::query::TaskStats,
        crate::task::validation::NewTaskFields,
        crate::task::validation::TaskUpdateFields,
        v1::DeleteResponse,
        ErrorResponse,
    )),
    tags((name = "Tasks", description = "Task management endpoints"))
)]
pub struct ApiDoc;

/// Handler for GET /api-docs/openapi.json - Returns the OpenAPI document.
#[tracing::instrument]
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(task_state: Arc<TaskState>) -> Router {
    v1::create_api_router(task_state).route("/api-docs/openapi.json", get(openapi_handler))
}
