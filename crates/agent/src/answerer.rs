use std::sync::Arc;

use tracing::{info, warn};

use taskpilot_core::outcome::{FallbackReason, Outcome};
use taskpilot_knowledge::KnowledgeBase;

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::prompts::{
    answer_user_prompt, ANSWER_SYSTEM_PROMPT, ANSWER_TEMPERATURE, GENERIC_ERROR_MESSAGE,
    NOT_FOUND_MESSAGE,
};

pub struct QuestionAnswerer {
    llm: Arc<dyn LlmClient>,
    knowledge: Arc<KnowledgeBase>,
    top_k: usize,
}

impl QuestionAnswerer {
    pub fn new(llm: Arc<dyn LlmClient>, knowledge: Arc<KnowledgeBase>, top_k: usize) -> Self {
        Self { llm, knowledge, top_k }
    }

    pub async fn retrieve(&self, question: &str) -> Vec<String> {
        self.knowledge.query(question, self.top_k).await
    }

    pub async fn answer(&self, question: &str) -> Outcome<String> {
        let chunks = self.retrieve(question).await;
        self.answer_with_context(question, &chunks).await
    }

    /// The model is never consulted without context.
    pub async fn answer_with_context(&self, question: &str, chunks: &[String]) -> Outcome<String> {
        if chunks.is_empty() {
            return Outcome::fallback(NOT_FOUND_MESSAGE.to_owned(), FallbackReason::NoContext);
        }

        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(ANSWER_SYSTEM_PROMPT),
                ChatMessage::user(answer_user_prompt(question, &chunks.join("\n\n"))),
            ],
            temperature: ANSWER_TEMPERATURE,
            json_object: false,
        };

        match self.llm.complete(request).await {
            Ok(answer) if !answer.trim().is_empty() => {
                info!(event_name = "answerer.answer.composed", chunk_count = chunks.len(), "question answered");
                Outcome::completed(answer.trim().to_owned())
            }
            Ok(_) => Outcome::fallback(
                GENERIC_ERROR_MESSAGE.to_owned(),
                FallbackReason::InvalidOutput("empty answer".to_owned()),
            ),
            Err(error) => {
                warn!(event_name = "answerer.model_call.failed", error = %error, "returning generic error message");
                Outcome::fallback(GENERIC_ERROR_MESSAGE.to_owned(), FallbackReason::ModelCall(error.to_string()))
            }
        }
    }
}
