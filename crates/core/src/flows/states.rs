use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalPurpose {
    Enrichment,
    Answer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Idle,
    Parsing,
    Retrieving(RetrievalPurpose),
    Enriching,
    CreatingTask,
    Answering,
    Done { degraded: bool },
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    TaskRequested,
    QuestionReceived,
    RecordParsed,
    ParseFellBack,
    ContextFound,
    NoContextFound,
    DescriptionComposed,
    EnrichmentFellBack,
    TaskCreated,
    TaskCreationFailed,
    AnswerComposed,
    AnswerFellBack,
}

impl FlowEvent {
    /// Events that substitute a documented default instead of a model result.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            Self::ParseFellBack | Self::NoContextFound | Self::EnrichmentFellBack | Self::AnswerFellBack
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub degraded: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub degraded: bool,
}
