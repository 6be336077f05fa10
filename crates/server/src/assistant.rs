use async_trait::async_trait;

use taskpilot_agent::{new_correlation_id, AssistantRuntime};
use taskpilot_core::domain::progress::ProgressSink;
use taskpilot_core::domain::task::CreatedTask;
use taskpilot_core::errors::TaskCreationError;
use taskpilot_telegram::AssistantService;

/// Exposes the assistant runtime to the chat bot.
pub struct RuntimeAssistant {
    runtime: AssistantRuntime,
}

impl RuntimeAssistant {
    pub fn new(runtime: AssistantRuntime) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl AssistantService for RuntimeAssistant {
    async fn create_task(
        &self,
        text: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CreatedTask, TaskCreationError> {
        let correlation_id = new_correlation_id();
        self.runtime.create_task_from_text(text, &correlation_id, sink).await.map(|run| run.created)
    }

    async fn answer_question(&self, question: &str, sink: &dyn ProgressSink) -> String {
        self.runtime.answer_question(question, sink).await.into_value()
    }
}
