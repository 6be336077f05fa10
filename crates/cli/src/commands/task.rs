use serde_json::json;

use crate::commands::{async_runtime, load_config, CommandResult};
use taskpilot_agent::{build_runtime, new_correlation_id};
use taskpilot_core::domain::progress::RecordingProgressSink;

pub fn run(text: &str) -> CommandResult {
    if text.trim().is_empty() {
        return CommandResult::failure("task", "invalid_input", "task request must not be empty", 1);
    }
    let config = match load_config("task") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match async_runtime("task") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let assistant = match build_runtime(&config).await {
            Ok(assistant) => assistant,
            Err(error) => return CommandResult::failure("task", "assembly", error.to_string(), 4),
        };
        let sink = RecordingProgressSink::default();
        let correlation_id = new_correlation_id();
        let outcome = assistant.create_task_from_text(text.trim(), &correlation_id, &sink).await;
        let progress: Vec<String> = sink.events().iter().map(|event| event.commentary()).collect();

        match outcome {
            Ok(run) => CommandResult::success_with_details(
                "task",
                format!("created task {} ({})", run.created.id, run.created.url),
                Some(json!({
                    "correlation_id": run.correlation_id,
                    "record": run.record.value(),
                    "record_fallback": run.record.is_fallback(),
                    "description": run.description.value(),
                    "degraded": run.is_degraded(),
                    "task": run.created,
                    "progress": progress,
                })),
            ),
            Err(error) => CommandResult::failure_with_details(
                "task",
                "task_creation",
                error.to_string(),
                7,
                Some(json!({ "correlation_id": correlation_id, "progress": progress })),
            ),
        }
    })
}
