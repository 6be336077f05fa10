use std::sync::Arc;

use tracing::{info, warn};

use taskpilot_core::domain::task::TaskRecord;
use taskpilot_core::outcome::{FallbackReason, Outcome};
use taskpilot_knowledge::KnowledgeBase;

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::prompts::{enrichment_user_prompt, ENRICHMENT_SYSTEM_PROMPT, ENRICHMENT_TEMPERATURE};

pub struct SopEnricher {
    llm: Arc<dyn LlmClient>,
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
}

impl SopEnricher {
    pub fn new(llm: Arc<dyn LlmClient>, knowledge: Arc<KnowledgeBase>, top_k: usize) -> Self {
        Self { llm, knowledge, top_k }
    }

    /// SOP chunks relevant to the record, queried as `"<category> <title>"`.
    pub async fn retrieve(&self, record: &TaskRecord) -> Vec<String> {
        self.knowledge.query(&record.retrieval_query(), self.top_k).await
    }

    pub async fn enrich(&self, record: &TaskRecord) -> Outcome<String> {
        let chunks = self.retrieve(record).await;
        self.enrich_with_context(record, &chunks).await
    }

    /// Falls back to the unchanged title when there is no context or the model fails.
    pub async fn enrich_with_context(&self, record: &TaskRecord, chunks: &[String]) -> Outcome<String> {
        if chunks.is_empty() {
            warn!(
                event_name = "enricher.context.empty",
                category = %record.category,
                "no SOP context; using title as description"
            );
            return Outcome::fallback(record.title.clone(), FallbackReason::NoContext);
        }

        let context = chunks.join("\n\n");
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(ENRICHMENT_SYSTEM_PROMPT),
                ChatMessage::user(enrichment_user_prompt(&record.title, &context)),
            ],
            temperature: ENRICHMENT_TEMPERATURE,
            json_object: false,
        };

        match self.llm.complete(request).await {
            Ok(description) if !description.trim().is_empty() => {
                info!(
                    event_name = "enricher.description.composed",
                    chunk_count = chunks.len(),
                    "task description enriched with SOP guidelines"
                );
                Outcome::completed(description.trim().to_owned())
            }
            Ok(_) => Outcome::fallback(
                record.title.clone(),
                FallbackReason::InvalidOutput("empty description".to_owned()),
            ),
            Err(error) => {
                warn!(event_name = "enricher.model_call.failed", error = %error, "using title as description");
                Outcome::fallback(record.title.clone(), FallbackReason::ModelCall(error.to_string()))
            }
        }
    }
}
