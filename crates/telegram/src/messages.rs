use taskpilot_core::domain::progress::ProgressEvent;
use taskpilot_core::domain::task::{CreatedTask, TaskRecord};
use taskpilot_core::errors::TaskCreationError;

use crate::router::ChatMode;

pub const SOP_PREVIEW_CHARS: usize = 150;

pub const START_TEXT: &str =
    "AI Task Assistant\n\nCommands:\n/task - Create a Todoist task\n/ask - Ask SOP question";
pub const TASK_MODE_TEXT: &str =
    "Send your task request.\n\nExample:\nBuy MacBook for new developer, urgent";
pub const ASK_MODE_TEXT: &str =
    "Send your SOP question.\n\nExample:\nWhich card should I use for laptop purchases?";
pub const CHOOSE_ACTION_TEXT: &str =
    "Please choose an action first:\n/task – Create task\n/ask – Ask SOP question";
pub const UNEXPECTED_ERROR_TEXT: &str = "An unexpected error occurred. Please try again.";
pub const NO_SOP_TEXT: &str = "No relevant SOP found.";

/// Text lines accumulated into one chat message.
#[derive(Default)]
pub struct MessageBuilder {
    lines: Vec<String>,
}

impl MessageBuilder {
    pub fn new(heading: impl Into<String>) -> Self {
        Self { lines: vec![heading.into()] }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn field(self, label: &str, value: impl std::fmt::Display) -> Self {
        self.line(format!("{label}: {value}"))
    }

    pub fn blank(self) -> Self {
        self.line(String::new())
    }

    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn parsed_task_text(record: &TaskRecord) -> String {
    MessageBuilder::new("Parsed Task")
        .field("Title", &record.title)
        .field("Category", record.category)
        .field("Priority", record.priority)
        .field("Deadline", &record.deadline_hint)
        .build()
}

/// One `- <first 150 chars>...` bullet per chunk, separated by blank lines.
pub fn sop_preview_text(chunks: &[String]) -> String {
    if chunks.is_empty() {
        return NO_SOP_TEXT.to_owned();
    }

    let preview = chunks
        .iter()
        .map(|chunk| {
            let head: String = chunk.chars().take(SOP_PREVIEW_CHARS).collect();
            format!("- {head}...")
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Relevant SOP\n{preview}")
}

pub fn enriched_description_text(description: &str) -> String {
    MessageBuilder::new("Enriched Description").line(description).build()
}

pub fn task_created_text(task: &CreatedTask) -> String {
    MessageBuilder::new("Task Created Successfully!")
        .blank()
        .field("Title", &task.content)
        .line(format!("Priority: P{}", task.priority))
        .line("Todoist URL:")
        .line(&task.url)
        .build()
}

pub fn task_failed_text(error: &TaskCreationError) -> String {
    MessageBuilder::new("Failed to create task.").field("Reason", error).build()
}

pub fn answer_text(answer: &str) -> String {
    MessageBuilder::new("Answer").line(answer).build()
}

/// Progress commentary for a chat in `mode`. Final results are rendered by the
/// router from the pipeline's return value, not from progress events.
pub fn progress_text(event: &ProgressEvent, mode: ChatMode) -> Option<String> {
    match (mode, event) {
        (ChatMode::Task, ProgressEvent::Parsing) => Some("Parsing request...".to_owned()),
        (ChatMode::Task, ProgressEvent::Parsed { record, .. }) => Some(parsed_task_text(record)),
        (_, ProgressEvent::Retrieving { .. }) => Some("Searching SOP...".to_owned()),
        (ChatMode::Task, ProgressEvent::ContextFound { chunks }) => Some(sop_preview_text(chunks)),
        (ChatMode::Task, ProgressEvent::Enriching) => {
            Some("Generating enriched description...".to_owned())
        }
        (ChatMode::Task, ProgressEvent::Enriched { description }) => {
            Some(enriched_description_text(description))
        }
        (ChatMode::Task, ProgressEvent::CreatingTask) => Some("Creating Todoist task...".to_owned()),
        _ => None,
    }
}
