use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use taskpilot_core::domain::progress::{ProgressEvent, ProgressSink};
use taskpilot_core::domain::task::{CreatedTask, TaskRecord};
use taskpilot_core::errors::TaskCreationError;
use taskpilot_core::flows::{FlowEngine, FlowEvent, FlowRun, FlowState, PipelineFlow};
use taskpilot_core::outcome::{FallbackReason, Outcome};
use taskpilot_knowledge::{KnowledgeBase, KnowledgeError, KnowledgeLifecycle};
use taskpilot_todoist::{TaskApi, TaskClient};

use crate::answerer::QuestionAnswerer;
use crate::enricher::SopEnricher;
use crate::llm::LlmClient;
use crate::parser::RequestParser;

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub source_path: PathBuf,
    pub top_k: usize,
}

/// Everything a successful task-creation run produced.
#[derive(Clone, Debug)]
pub struct TaskRun {
    pub correlation_id: String,
    pub record: Outcome<TaskRecord>,
    pub context: Vec<String>,
    pub description: Outcome<String>,
    pub created: CreatedTask,
    pub final_state: FlowState,
}

impl TaskRun {
    pub fn is_degraded(&self) -> bool {
        matches!(self.final_state, FlowState::Done { degraded: true })
    }
}

/// Fresh id for callers that have no request id of their own.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Orchestrates parse → retrieve → enrich → create, and retrieve → answer.
///
/// Clones share the model client, knowledge base and task client; each clone
/// made with [`AssistantRuntime::for_session`] gets its own load-once cell.
#[derive(Clone)]
pub struct AssistantRuntime {
    parser: Arc<RequestParser>,
    enricher: Arc<SopEnricher>,
    answerer: Arc<QuestionAnswerer>,
    tasks: Arc<TaskClient>,
    lifecycle: Arc<KnowledgeLifecycle>,
    flow: Arc<FlowEngine<PipelineFlow>>,
}

impl AssistantRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        knowledge: Arc<KnowledgeBase>,
        task_api: Arc<dyn TaskApi>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            parser: Arc::new(RequestParser::new(llm.clone())),
            enricher: Arc::new(SopEnricher::new(llm.clone(), knowledge.clone(), settings.top_k)),
            answerer: Arc::new(QuestionAnswerer::new(llm, knowledge.clone(), settings.top_k)),
            tasks: Arc::new(TaskClient::new(task_api)),
            lifecycle: Arc::new(KnowledgeLifecycle::new(knowledge, settings.source_path)),
            flow: Arc::new(FlowEngine::default()),
        }
    }

    /// Same collaborators, fresh knowledge lifecycle.
    pub fn for_session(&self) -> Self {
        let lifecycle = KnowledgeLifecycle::new(
            self.lifecycle.knowledge().clone(),
            self.lifecycle.source_path().to_path_buf(),
        );
        Self { lifecycle: Arc::new(lifecycle), ..self.clone() }
    }

    pub fn lifecycle(&self) -> &KnowledgeLifecycle {
        &self.lifecycle
    }

    pub async fn ensure_knowledge_loaded(&self) -> Result<usize, KnowledgeError> {
        self.lifecycle.ensure_loaded().await
    }

    /// Every log line and the returned [`TaskRun`] carry `correlation_id`.
    pub async fn create_task_from_text(
        &self,
        text: &str,
        correlation_id: &str,
        sink: &dyn ProgressSink,
    ) -> Result<TaskRun, TaskCreationError> {
        info!(
            event_name = "pipeline.task.start",
            correlation_id = %correlation_id,
            "task pipeline started"
        );
        self.prepare_knowledge(correlation_id).await;

        let mut run = self.flow.start();
        step(&mut run, FlowEvent::TaskRequested, correlation_id);

        sink.emit(ProgressEvent::Parsing).await;
        let record = self.parser.parse(text).await;
        let parse_event =
            if record.is_fallback() { FlowEvent::ParseFellBack } else { FlowEvent::RecordParsed };
        step(&mut run, parse_event, correlation_id);
        sink.emit(ProgressEvent::Parsed {
            record: record.value().clone(),
            fallback: record.is_fallback(),
        })
        .await;

        sink.emit(ProgressEvent::Retrieving { query: record.value().retrieval_query() }).await;
        let context = self.enricher.retrieve(record.value()).await;
        sink.emit(ProgressEvent::ContextFound { chunks: context.clone() }).await;

        let description = if context.is_empty() {
            step(&mut run, FlowEvent::NoContextFound, correlation_id);
            Outcome::fallback(record.value().title.clone(), FallbackReason::NoContext)
        } else {
            step(&mut run, FlowEvent::ContextFound, correlation_id);
            sink.emit(ProgressEvent::Enriching).await;
            let description = self.enricher.enrich_with_context(record.value(), &context).await;
            let enrich_event = if description.is_fallback() {
                FlowEvent::EnrichmentFellBack
            } else {
                FlowEvent::DescriptionComposed
            };
            step(&mut run, enrich_event, correlation_id);
            description
        };
        sink.emit(ProgressEvent::Enriched { description: description.value().clone() }).await;

        sink.emit(ProgressEvent::CreatingTask).await;
        match self.tasks.create_task(record.value(), description.value()).await {
            Ok(created) => {
                step(&mut run, FlowEvent::TaskCreated, correlation_id);
                sink.emit(ProgressEvent::TaskCreated { task: created.clone() }).await;
                let final_state = run.state().clone();
                info!(
                    event_name = "pipeline.task.completed",
                    correlation_id = %correlation_id,
                    task_id = %created.id,
                    degraded = run.is_degraded(),
                    transitions = run.history().len(),
                    "task pipeline completed"
                );
                Ok(TaskRun {
                    correlation_id: correlation_id.to_owned(),
                    record,
                    context,
                    description,
                    created,
                    final_state,
                })
            }
            Err(cause) => {
                step(&mut run, FlowEvent::TaskCreationFailed, correlation_id);
                sink.emit(ProgressEvent::TaskFailed { reason: cause.to_string() }).await;
                error!(
                    event_name = "pipeline.task.failed",
                    correlation_id = %correlation_id,
                    error = %cause,
                    "task creation failed"
                );
                Err(cause)
            }
        }
    }

    pub async fn answer_question(&self, question: &str, sink: &dyn ProgressSink) -> Outcome<String> {
        let correlation_id = new_correlation_id();
        info!(
            event_name = "pipeline.question.start",
            correlation_id = %correlation_id,
            "question pipeline started"
        );
        self.prepare_knowledge(&correlation_id).await;

        let mut run = self.flow.start();
        step(&mut run, FlowEvent::QuestionReceived, &correlation_id);

        sink.emit(ProgressEvent::Retrieving { query: question.to_owned() }).await;
        let context = self.answerer.retrieve(question).await;
        sink.emit(ProgressEvent::ContextFound { chunks: context.clone() }).await;

        let answer = if context.is_empty() {
            step(&mut run, FlowEvent::NoContextFound, &correlation_id);
            self.answerer.answer_with_context(question, &context).await
        } else {
            step(&mut run, FlowEvent::ContextFound, &correlation_id);
            sink.emit(ProgressEvent::Answering).await;
            let answer = self.answerer.answer_with_context(question, &context).await;
            let event = if answer.is_fallback() {
                FlowEvent::AnswerFellBack
            } else {
                FlowEvent::AnswerComposed
            };
            step(&mut run, event, &correlation_id);
            answer
        };

        info!(
            event_name = "pipeline.question.completed",
            correlation_id = %correlation_id,
            degraded = run.is_degraded(),
            "question pipeline completed"
        );
        answer
    }

    /// Load failures are logged; retrieval then degrades to empty context.
    async fn prepare_knowledge(&self, correlation_id: &str) {
        if let Err(error) = self.lifecycle.ensure_loaded().await {
            warn!(
                event_name = "pipeline.knowledge.unavailable",
                correlation_id = %correlation_id,
                error = %error,
                "knowledge base could not be loaded"
            );
        }
    }
}

fn step(run: &mut FlowRun<'_, PipelineFlow>, event: FlowEvent, correlation_id: &str) {
    match run.advance(event) {
        Ok(outcome) => debug!(
            event_name = "pipeline.transition_applied",
            correlation_id = %correlation_id,
            from = ?outcome.from,
            to = ?outcome.to,
            "pipeline transition applied"
        ),
        Err(error) => error!(
            event_name = "pipeline.transition_rejected",
            correlation_id = %correlation_id,
            error = %error,
            "pipeline transition rejected"
        ),
    }
}
