use std::path::PathBuf;
use std::sync::Arc;
use task_server::task::TaskService;
use task_server::task::api::v1::TaskState;
use task_server::task::store::JsonFileTaskStore;
use tempfile::TempDir;

/// Test context backed by a task document in a temporary directory.
pub struct TestContext {
    #[allow(dead_code)] // dir is kept to ensure it's not dropped
    pub dir: TempDir,
    pub data_file: PathBuf,
    pub service: TaskService,
}

impl TestContext {
    #[allow(dead_code)]
    pub fn task_state(&self) -> Arc<TaskState> {
        Arc::new(TaskState::new(self.service.clone()))
    }

    #[allow(dead_code)]
    pub fn read_document(&self) -> serde_json::Value {
        let contents = std::fs::read_to_string(&self.data_file).expect("Failed to read document");
        serde_json::from_str(&contents).expect("Document is not valid JSON")
    }
}

pub fn setup() -> anyhow::Result<TestContext> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().try_init();
    let dir = TempDir::new()?;
    let data_file = dir.path().join("data").join("data.json");
    let store = JsonFileTaskStore::new(&data_file);
    let service = TaskService::new(Arc::new(store));
    Ok(TestContext {
        dir,
        data_file,
        service,
    })
}

/// Same as [`setup`], with the document pre-populated with `document`.
#[allow(dead_code)]
pub fn setup_with_document(document: &serde_json::Value) -> anyhow::Result<TestContext> {
    let context = setup()?;
    if let Some(parent) = context.data_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&context.data_file, serde_json::to_string_pretty(document)?)?;
    Ok(context)
}

/// The single task the endpoint tests start from.
#[allow(dead_code)]
pub fn existing_task_document() -> serde_json::Value {
    serde_json::json!({
        "tasks": [
            {
                "id": "test-id-1",
                "title": "Existing Task 1",
                "completed": false,
                "priority": "medium",
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-01T00:00:00.000Z"
            }
        ]
    })
}
