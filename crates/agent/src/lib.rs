//! Assistant pipelines on top of the model, knowledge and task clients.
//!
//! - `parser` turns free text into a [`TaskRecord`](taskpilot_core::TaskRecord)
//! - `enricher` rewrites the title into an SOP-grounded description
//! - `answerer` answers questions strictly from retrieved SOP context
//! - `runtime` sequences them through the pipeline flow and reports progress
//!
//! Every model-backed step degrades to a deterministic fallback instead of
//! failing. Only task creation surfaces an error to the caller.

pub mod answerer;
pub mod assembly;
pub mod enricher;
pub mod llm;
pub mod parser;
pub mod prompts;
pub mod runtime;

pub use answerer::QuestionAnswerer;
pub use assembly::{build_runtime, AssemblyError};
pub use enricher::SopEnricher;
pub use llm::{ChatCompletionsClient, ChatMessage, CompletionRequest, LlmClient, Role, ScriptedLlmClient};
pub use parser::RequestParser;
pub use prompts::{GENERIC_ERROR_MESSAGE, NOT_FOUND_MESSAGE};
pub use runtime::{new_correlation_id, AssistantRuntime, RuntimeSettings, TaskRun};
