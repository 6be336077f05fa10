use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use taskpilot_core::domain::task::{Category, Priority, TaskRecord, UNSPECIFIED_DEADLINE};
use taskpilot_core::outcome::{FallbackReason, Outcome};

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::prompts::{EXTRACTION_SYSTEM_PROMPT, EXTRACTION_TEMPERATURE};

/// Exact shape the extraction prompt asks for.
#[derive(Debug, Deserialize)]
struct RawTaskRecord {
    title: String,
    priority: String,
    category: String,
    deadline_hint: String,
}

pub struct RequestParser {
    llm: Arc<dyn LlmClient>,
}

impl RequestParser {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Never fails: any model or shape error yields [`TaskRecord::fallback_for`].
    pub async fn parse(&self, text: &str) -> Outcome<TaskRecord> {
        let request = CompletionRequest {
            messages: vec![ChatMessage::system(EXTRACTION_SYSTEM_PROMPT), ChatMessage::user(text)],
            temperature: EXTRACTION_TEMPERATURE,
            json_object: true,
        };

        let output = match self.llm.complete(request).await {
            Ok(output) => output,
            Err(error) => {
                warn!(event_name = "parser.model_call.failed", error = %error, "falling back to naive record");
                return Outcome::fallback(
                    TaskRecord::fallback_for(text),
                    FallbackReason::ModelCall(error.to_string()),
                );
            }
        };

        match decode_record(&output) {
            Ok(record) => {
                info!(
                    event_name = "parser.record.extracted",
                    category = %record.category,
                    priority = %record.priority,
                    "task record extracted"
                );
                Outcome::completed(record)
            }
            Err(detail) => {
                warn!(event_name = "parser.output.rejected", detail = %detail, "falling back to naive record");
                Outcome::fallback(TaskRecord::fallback_for(text), FallbackReason::InvalidOutput(detail))
            }
        }
    }
}

fn decode_record(output: &str) -> Result<TaskRecord, String> {
    let raw: RawTaskRecord =
        serde_json::from_str(strip_code_fence(output)).map_err(|error| error.to_string())?;

    let title = raw.title.trim();
    if title.is_empty() {
        return Err("title is empty".to_owned());
    }

    let deadline_hint = match raw.deadline_hint.trim() {
        "" => UNSPECIFIED_DEADLINE.to_owned(),
        hint => hint.to_owned(),
    };

    Ok(TaskRecord {
        title: title.to_owned(),
        priority: Priority::from_label(&raw.priority),
        category: Category::from_label(&raw.category),
        deadline_hint,
    })
}

fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
