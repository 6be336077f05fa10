use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use taskpilot_agent::{AssistantRuntime, RuntimeSettings, ScriptedLlmClient};
use taskpilot_core::errors::{ModelCallError, TaskCreationError};
use taskpilot_knowledge::{
    connect_with_settings, migrations, DbPool, HashingEmbedder, InMemoryVectorStore,
    KnowledgeBase, KnowledgeSettings, SqliteVectorStore, VectorStore,
};
use taskpilot_todoist::{NewTask, TaskApi, TaskResponse};

pub const SOP: &str = "\
Expense Policy Overview. Every purchase needs an itemised receipt.

Equipment Purchases. Laptop purchases such as a MacBook use the corporate card and need IT approval.

Travel Booking. Flights are booked through the travel portal two weeks ahead.";

pub struct FakeTaskApi {
    pub reply: Mutex<Option<TaskCreationError>>,
    pub submitted: Mutex<Vec<NewTask>>,
}

#[async_trait]
impl TaskApi for FakeTaskApi {
    async fn add_task(&self, task: &NewTask) -> Result<TaskResponse, TaskCreationError> {
        self.submitted.lock().expect("submitted lock").push(task.clone());
        if let Some(error) = self.reply.lock().expect("reply lock").clone() {
            return Err(error);
        }
        Ok(TaskResponse {
            id: Some(json!(7001)),
            url: None,
            content: Some(task.content.clone()),
            priority: Some(task.priority),
        })
    }
}

pub struct Fixture {
    pub runtime: AssistantRuntime,
    pub llm: Arc<ScriptedLlmClient>,
    pub tasks: Arc<FakeTaskApi>,
    _dir: TempDir,
}

fn build(
    store: Arc<dyn VectorStore>,
    script: Vec<Result<String, ModelCallError>>,
) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let source_path = dir.path().join("sop_expenses.txt");
    std::fs::write(&source_path, SOP).expect("write sop");

    let knowledge = KnowledgeBase::new(
        store,
        Arc::new(HashingEmbedder::default()),
        KnowledgeSettings { collection: "sop_knowledge_base".to_owned(), chunk_size: 120 },
    );
    let llm = Arc::new(ScriptedLlmClient::new(script));
    let tasks =
        Arc::new(FakeTaskApi { reply: Mutex::new(None), submitted: Mutex::new(Vec::new()) });
    let runtime = AssistantRuntime::new(
        llm.clone(),
        Arc::new(knowledge),
        tasks.clone(),
        RuntimeSettings { source_path, top_k: 3 },
    );
    Fixture { runtime, llm, tasks, _dir: dir }
}

/// Runtime over an in-memory store, a scripted model and a fake task API.
pub fn fixture_runtime(script: Vec<Result<String, ModelCallError>>) -> Fixture {
    build(Arc::new(InMemoryVectorStore::default()), script)
}

pub async fn sqlite_runtime() -> (Fixture, DbPool) {
    let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
    migrations::run_pending(&pool).await.expect("migrations");
    (build(Arc::new(SqliteVectorStore::new(pool.clone())), Vec::new()), pool)
}
