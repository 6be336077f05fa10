use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use taskpilot_core::config::AppConfig;
use taskpilot_core::errors::{ModelCallError, TaskCreationError};
use taskpilot_knowledge::{open_knowledge_base, KnowledgeError};
use taskpilot_todoist::TodoistApi;

use crate::llm::ChatCompletionsClient;
use crate::runtime::{AssistantRuntime, RuntimeSettings};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("model client could not be built: {0}")]
    Model(#[from] ModelCallError),
    #[error("task service client could not be built: {0}")]
    TaskService(#[from] TaskCreationError),
    #[error("knowledge base could not be opened: {0}")]
    Knowledge(#[from] KnowledgeError),
}

/// Wires the production model, knowledge base and Todoist clients from config.
/// The SOP document itself is loaded lazily on first use.
pub async fn build_runtime(config: &AppConfig) -> Result<AssistantRuntime, AssemblyError> {
    let llm = ChatCompletionsClient::new(&config.llm)?;
    let task_api = TodoistApi::new(&config.todoist)?;
    let knowledge = open_knowledge_base(&config.knowledge, &config.embedding).await?;

    info!(
        event_name = "runtime.assembled",
        llm_provider = ?config.llm.provider,
        llm_model = %config.llm.model,
        collection = %config.knowledge.collection,
        "assistant runtime assembled"
    );

    Ok(AssistantRuntime::new(
        Arc::new(llm),
        Arc::new(knowledge),
        Arc::new(task_api),
        RuntimeSettings {
            source_path: config.knowledge.source_path.clone(),
            top_k: config.knowledge.top_k,
        },
    ))
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use tempfile::TempDir;

    use taskpilot_core::config::AppConfig;

    use super::build_runtime;

    #[tokio::test]
    async fn runtime_builds_from_default_config_with_memory_store() {
        let dir = TempDir::new().expect("tempdir");
        let source = dir.path().join("sop.txt");
        std::fs::write(&source, "Receipts.\n\nCorporate card for equipment.").expect("write sop");

        let mut config = AppConfig::default();
        config.llm.api_key = SecretString::from("test-key");
        config.todoist.api_token = SecretString::from("test-token");
        config.knowledge.store_url = "memory://".to_owned();
        config.knowledge.source_path = source;

        let runtime = build_runtime(&config).await.expect("runtime");
        assert_eq!(runtime.ensure_knowledge_loaded().await.expect("loaded"), 1);
        assert_eq!(runtime.lifecycle().knowledge().collection(), "sop_knowledge_base");
    }
}
