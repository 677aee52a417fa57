use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::task::TaskService;
use crate::task::api::v1::TaskState;
use crate::task::store::{JsonFileTaskStore, TaskStore};

pub mod api;

use self::api::ErrorResponse;

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("{}:{}", &config.host, &config.port);

    // A corrupt document has to be repaired by an operator before serving.
    let store = JsonFileTaskStore::new(&config.data_file);
    let tasks = store.load().await?;
    tracing::info!(
        "Loaded {} tasks from {}",
        tasks.len(),
        store.path().display()
    );

    let task_state = Arc::new(TaskState::new(TaskService::new(Arc::new(store))));
    let app = create_app(task_state);

    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);
    tracing::info!("- GET /tasks - Get all tasks");
    tracing::info!("- GET /tasks/stats - Get task statistics");
    tracing::info!("- POST /tasks - Create a new task");
    tracing::info!("- PUT /tasks/{{id}} - Update a task");
    tracing::info!("- DELETE /tasks/{{id}} - Delete a task");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full application router with its middleware stack.
pub fn create_app(task_state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .merge(api::create_api_router(task_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CatchPanicLayer::custom(panic_response)),
        )
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Unhandled error: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error".to_string())),
    )
        .into_response()
}
