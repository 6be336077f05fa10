pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowRun, FlowTransitionError, PipelineFlow};
pub use states::{FlowContext, FlowEvent, FlowState, RetrievalPurpose, TransitionOutcome};
