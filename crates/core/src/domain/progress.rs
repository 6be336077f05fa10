use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::task::{CreatedTask, TaskRecord};

/// Step-by-step commentary emitted while a pipeline run is in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ProgressEvent {
    Parsing,
    Parsed { record: TaskRecord, fallback: bool },
    Retrieving { query: String },
    ContextFound { chunks: Vec<String> },
    Enriching,
    Enriched { description: String },
    Answering,
    CreatingTask,
    TaskCreated { task: CreatedTask },
    TaskFailed { reason: String },
}

impl ProgressEvent {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Parsed { .. } => "parsed",
            Self::Retrieving { .. } => "retrieving",
            Self::ContextFound { .. } => "context_found",
            Self::Enriching => "enriching",
            Self::Enriched { .. } => "enriched",
            Self::Answering => "answering",
            Self::CreatingTask => "creating_task",
            Self::TaskCreated { .. } => "task_created",
            Self::TaskFailed { .. } => "task_failed",
        }
    }

    /// One-line human commentary for plain-text surfaces.
    pub fn commentary(&self) -> String {
        match self {
            Self::Parsing => "Parsing request...".to_owned(),
            Self::Parsed { record, fallback } => {
                let suffix = if *fallback { " (fallback)" } else { "" };
                format!(
                    "Parsed task: {} [{} / {}, deadline: {}]{suffix}",
                    record.title, record.category, record.priority, record.deadline_hint
                )
            }
            Self::Retrieving { .. } => "Searching SOP...".to_owned(),
            Self::ContextFound { chunks } if chunks.is_empty() => {
                "No relevant SOP guidelines found.".to_owned()
            }
            Self::ContextFound { chunks } => {
                format!("Found {} relevant SOP section(s).", chunks.len())
            }
            Self::Enriching => "Generating enriched description...".to_owned(),
            Self::Enriched { .. } => "Description ready.".to_owned(),
            Self::Answering => "Generating answer...".to_owned(),
            Self::CreatingTask => "Creating Todoist task...".to_owned(),
            Self::TaskCreated { task } => format!("Task created: {}", task.url),
            Self::TaskFailed { reason } => format!("Failed to create task. Reason: {reason}"),
        }
    }
}

#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent);
}

#[derive(Clone, Default)]
pub struct RecordingProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingProgressSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn steps(&self) -> Vec<&'static str> {
        self.events().iter().map(ProgressEvent::step).collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgressSink {
    async fn emit(&self, event: ProgressEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
