use serde_json::json;

use crate::commands::{async_runtime, load_config, CommandResult};
use taskpilot_agent::build_runtime;
use taskpilot_core::domain::progress::RecordingProgressSink;

pub fn run(question: &str) -> CommandResult {
    if question.trim().is_empty() {
        return CommandResult::failure("ask", "invalid_input", "question must not be empty", 1);
    }
    let config = match load_config("ask") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let assistant = match build_runtime(&config).await {
            Ok(assistant) => assistant,
            Err(error) => return CommandResult::failure("ask", "assembly", error.to_string(), 4),
        };
        let sink = RecordingProgressSink::default();
        let answer = assistant.answer_question(question.trim(), &sink).await;
        let progress: Vec<String> = sink.events().iter().map(|event| event.commentary()).collect();

        CommandResult::success_with_details(
            "ask",
            answer.value().clone(),
            Some(json!({
                "fallback": answer.is_fallback(),
                "fallback_reason": answer.fallback_reason(),
                "progress": progress,
            })),
        )
    })
}
