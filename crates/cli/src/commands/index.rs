use serde_json::json;

use crate::commands::{async_runtime, load_config, CommandResult};
use taskpilot_knowledge::{open_knowledge_base, KnowledgeError};

pub fn run(reload: bool) -> CommandResult {
    let config = match load_config("index") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("index") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let source = config.knowledge.source_path.clone();
    let result = runtime.block_on(async {
        let knowledge = open_knowledge_base(&config.knowledge, &config.embedding).await?;
        let chunks =
            if reload { knowledge.reload(&source).await? } else { knowledge.load(&source).await? };
        let total = knowledge.indexed_chunk_count().await?.unwrap_or_default();
        Ok::<(usize, usize), KnowledgeError>((chunks, total))
    });

    match result {
        Ok((chunks, total)) => CommandResult::success_with_details(
            "index",
            format!(
                "indexed {chunks} chunk(s) from `{}` into `{}`",
                source.display(),
                config.knowledge.collection
            ),
            Some(json!({
                "chunks": chunks,
                "collection_total": total,
                "reloaded": reload,
                "store_url": config.knowledge.store_url,
            })),
        ),
        Err(error @ KnowledgeError::Load { .. }) => {
            CommandResult::failure("index", "knowledge_load", error.to_string(), 6)
        }
        Err(error) => CommandResult::failure("index", "knowledge_index", error.to_string(), 4),
    }
}
