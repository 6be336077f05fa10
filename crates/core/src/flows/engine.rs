use thiserror::Error;

use crate::flows::states::{FlowContext, FlowEvent, FlowState, RetrievalPurpose, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Per-interaction pipeline: task creation and question answering share `Idle`.
#[derive(Clone, Debug, Default)]
pub struct PipelineFlow;

impl FlowDefinition for PipelineFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_pipeline(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn start(&self) -> FlowRun<'_, F> {
        FlowRun {
            engine: self,
            state: self.initial_state(),
            context: FlowContext::default(),
            history: Vec::new(),
        }
    }
}

impl Default for FlowEngine<PipelineFlow> {
    fn default() -> Self {
        Self::new(PipelineFlow)
    }
}

/// A single walk through a flow, accumulating the degraded flag and history.
pub struct FlowRun<'a, F> {
    engine: &'a FlowEngine<F>,
    state: FlowState,
    context: FlowContext,
    history: Vec<TransitionOutcome>,
}

impl<F> FlowRun<'_, F>
where
    F: FlowDefinition,
{
    pub fn advance(&mut self, event: FlowEvent) -> Result<&TransitionOutcome, FlowTransitionError> {
        let outcome = self.engine.apply(&self.state, &event, &self.context)?;
        self.state = outcome.to.clone();
        self.context.degraded = outcome.degraded;
        self.history.push(outcome);
        Ok(&self.history[self.history.len() - 1])
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn is_degraded(&self) -> bool {
        self.context.degraded
    }

    pub fn history(&self) -> &[TransitionOutcome] {
        &self.history
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_pipeline(
    current: &FlowState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowEvent::{
        AnswerComposed, AnswerFellBack, ContextFound, DescriptionComposed, EnrichmentFellBack,
        NoContextFound, ParseFellBack, QuestionReceived, RecordParsed, TaskCreated,
        TaskCreationFailed, TaskRequested,
    };
    use FlowState::{Answering, CreatingTask, Done, Enriching, Failed, Idle, Parsing, Retrieving};
    use RetrievalPurpose::{Answer, Enrichment};

    let degraded = context.degraded || event.is_fallback();

    let to = match (current, event) {
        (Idle, TaskRequested) => Parsing,
        (Idle, QuestionReceived) => Retrieving(Answer),
        (Parsing, RecordParsed) | (Parsing, ParseFellBack) => Retrieving(Enrichment),
        (Retrieving(Enrichment), ContextFound) => Enriching,
        // Without context the title is used as-is and enrichment is skipped.
        (Retrieving(Enrichment), NoContextFound) => CreatingTask,
        (Enriching, DescriptionComposed) | (Enriching, EnrichmentFellBack) => CreatingTask,
        (CreatingTask, TaskCreated) => Done { degraded },
        (CreatingTask, TaskCreationFailed) => Failed,
        (Retrieving(Answer), ContextFound) => Answering,
        (Retrieving(Answer), NoContextFound) => Done { degraded },
        (Answering, AnswerComposed) | (Answering, AnswerFellBack) => Done { degraded },
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), degraded })
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{FlowEngine, FlowTransitionError, PipelineFlow};
    use crate::flows::states::{FlowContext, FlowEvent, FlowState, RetrievalPurpose};

    #[test]
    fn task_pipeline_happy_path_is_not_degraded() {
        let engine = FlowEngine::default();
        let mut run = engine.start();

        for event in [
            FlowEvent::TaskRequested,
            FlowEvent::RecordParsed,
            FlowEvent::ContextFound,
            FlowEvent::DescriptionComposed,
        ] {
            run.advance(event).expect("happy path transition");
        }
        assert_eq!(run.state(), &FlowState::CreatingTask);

        let done = run.advance(FlowEvent::TaskCreated).expect("creating -> done");
        assert_eq!(done.to, FlowState::Done { degraded: false });
        assert_eq!(done.from, FlowState::CreatingTask);
        assert_eq!(run.history().len(), 5);
    }

    #[test]
    fn parse_fallback_still_reaches_task_creation_but_marks_run_degraded() {
        let engine = FlowEngine::default();
        let mut run = engine.start();

        run.advance(FlowEvent::TaskRequested).expect("idle -> parsing");
        let retrieving = run.advance(FlowEvent::ParseFellBack).expect("parsing -> retrieving");
        assert_eq!(retrieving.to, FlowState::Retrieving(RetrievalPurpose::Enrichment));
        assert!(run.is_degraded());

        run.advance(FlowEvent::ContextFound).expect("retrieving -> enriching");
        run.advance(FlowEvent::DescriptionComposed).expect("enriching -> creating");
        let done = run.advance(FlowEvent::TaskCreated).expect("creating -> done");
        assert_eq!(done.to, FlowState::Done { degraded: true });
    }

    #[test]
    fn missing_context_skips_enrichment() {
        let engine = FlowEngine::default();
        let mut run = engine.start();

        run.advance(FlowEvent::TaskRequested).expect("idle -> parsing");
        run.advance(FlowEvent::RecordParsed).expect("parsing -> retrieving");
        let outcome = run.advance(FlowEvent::NoContextFound).expect("retrieving -> creating");

        assert_eq!(outcome.to, FlowState::CreatingTask);
        assert!(outcome.degraded);
    }

    #[test]
    fn only_task_creation_reaches_failed() {
        let engine = FlowEngine::default();
        let failed = engine
            .apply(&FlowState::CreatingTask, &FlowEvent::TaskCreationFailed, &FlowContext::default())
            .expect("creating -> failed");
        assert_eq!(failed.to, FlowState::Failed);

        let error = engine
            .apply(&FlowState::Enriching, &FlowEvent::TaskCreationFailed, &FlowContext::default())
            .expect_err("enrichment has no fatal edge");
        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                state: FlowState::Enriching,
                event: FlowEvent::TaskCreationFailed
            }
        ));
    }

    #[test]
    fn question_without_context_finishes_degraded_without_answering() {
        let engine = FlowEngine::default();
        let mut run = engine.start();

        run.advance(FlowEvent::QuestionReceived).expect("idle -> retrieving");
        let done = run.advance(FlowEvent::NoContextFound).expect("retrieving -> done");

        assert_eq!(done.to, FlowState::Done { degraded: true });
        assert!(!run.history().iter().any(|step| step.to == FlowState::Answering));
    }

    #[test]
    fn question_with_context_goes_through_answering() {
        let engine = FlowEngine::default();
        let mut run = engine.start();

        run.advance(FlowEvent::QuestionReceived).expect("idle -> retrieving");
        run.advance(FlowEvent::ContextFound).expect("retrieving -> answering");
        let done = run.advance(FlowEvent::AnswerComposed).expect("answering -> done");

        assert_eq!(done.to, FlowState::Done { degraded: false });
    }

    #[test]
    fn retrieval_purpose_keeps_paths_apart() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(
                &FlowState::Retrieving(RetrievalPurpose::Answer),
                &FlowEvent::DescriptionComposed,
                &FlowContext::default(),
            )
            .expect_err("answer retrieval cannot compose a description");
        assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));

        let error = engine
            .apply(&FlowState::Idle, &FlowEvent::TaskCreated, &FlowContext::default())
            .expect_err("idle cannot jump to done");
        assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = FlowEngine::default();
        let events = [
            FlowEvent::TaskRequested,
            FlowEvent::RecordParsed,
            FlowEvent::ContextFound,
            FlowEvent::EnrichmentFellBack,
            FlowEvent::TaskCreated,
        ];

        let run = |engine: &FlowEngine<PipelineFlow>| {
            let mut run = engine.start();
            for event in &events {
                run.advance(event.clone()).expect("deterministic run");
            }
            (run.state().clone(), run.history().to_vec())
        };

        let first = run(&engine);
        let second = run(&engine);

        assert_eq!(first, second);
        assert_eq!(first.0, FlowState::Done { degraded: true });
    }
}
