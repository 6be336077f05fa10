pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod outcome;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, RequiredKey};
pub use domain::progress::{ProgressEvent, ProgressSink, RecordingProgressSink};
pub use domain::task::{Category, CreatedTask, Priority, TaskRecord};
pub use errors::{ApplicationError, InterfaceError, ModelCallError, TaskCreationError};
pub use flows::{FlowEngine, FlowEvent, FlowRun, FlowState, PipelineFlow, TransitionOutcome};
pub use outcome::{FallbackReason, Outcome};
