//! Browser front end.
//!
//! - `GET  /`                  - task and question forms (HTML)
//! - `POST /api/v1/tasks`      - `{ "text" }` → created task + progress
//! - `POST /api/v1/questions`  - `{ "question" }` → answer + progress
//!
//! Requests carrying `x-session-id` reuse that session's runtime; each session
//! loads the knowledge source once.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use taskpilot_agent::AssistantRuntime;
use taskpilot_core::domain::progress::RecordingProgressSink;
use taskpilot_core::domain::task::{CreatedTask, TaskRecord};
use taskpilot_core::errors::{ApplicationError, InterfaceError};

pub const SESSION_HEADER: &str = "x-session-id";
const MAX_SESSION_ID_LEN: usize = 64;

/// Session id → runtime sharing the base collaborators with its own load cell.
pub struct SessionRegistry {
    base: AssistantRuntime,
    sessions: RwLock<HashMap<String, AssistantRuntime>>,
}

impl SessionRegistry {
    pub fn new(base: AssistantRuntime) -> Self {
        Self { base, sessions: RwLock::new(HashMap::new()) }
    }

    /// Unknown or malformed ids get a fresh session.
    pub async fn resolve(&self, requested: Option<&str>) -> (String, AssistantRuntime) {
        let requested = requested.filter(|id| is_valid_session_id(id));
        if let Some(id) = requested {
            if let Some(runtime) = self.sessions.read().await.get(id) {
                return (id.to_owned(), runtime.clone());
            }
        }

        let id = requested.map(str::to_owned).unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut sessions = self.sessions.write().await;
        let runtime = sessions.entry(id.clone()).or_insert_with(|| self.base.for_session()).clone();
        (id, runtime)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

#[derive(Clone)]
pub struct WebState {
    sessions: Arc<SessionRegistry>,
    templates: Arc<Tera>,
}

impl WebState {
    pub fn new(runtime: AssistantRuntime) -> Self {
        Self { sessions: Arc::new(SessionRegistry::new(runtime)), templates: init_templates() }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub session_id: String,
    pub correlation_id: String,
    pub progress: Vec<String>,
    pub record: TaskRecord,
    pub record_fallback: bool,
    pub context: Vec<String>,
    pub description: String,
    pub degraded: bool,
    pub task: CreatedTask,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub session_id: String,
    pub progress: Vec<String>,
    pub answer: String,
    pub fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
    pub progress: Vec<String>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(error) = tera.add_raw_template("index.html", include_str!("../templates/index.html")) {
        warn!(event_name = "web.templates.invalid", error = %error, "index template failed to compile");
    }
    Arc::new(tera)
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/v1/tasks", post(create_task))
        .route("/api/v1/questions", post(ask_question))
        .with_state(state)
}

fn requested_session(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok())
}

async fn index_page(
    headers: HeaderMap,
    State(state): State<WebState>,
) -> Result<(HeaderMap, Html<String>), (StatusCode, Html<String>)> {
    let (session_id, runtime) = state.sessions.resolve(requested_session(&headers)).await;

    let (knowledge_ready, knowledge_message) = match runtime.ensure_knowledge_loaded().await {
        Ok(chunks) => (true, format!("SOP loaded successfully: {chunks} chunks indexed")),
        Err(load_error) => {
            warn!(
                event_name = "web.knowledge.load_failed",
                session_id = %session_id,
                error = %load_error,
                "knowledge source could not be loaded"
            );
            (false, format!("Failed to load SOP: {load_error}"))
        }
    };

    let mut context = Context::new();
    context.insert("session_id", &session_id);
    context.insert("knowledge_ready", &knowledge_ready);
    context.insert("knowledge_message", &knowledge_message);

    let body = state.templates.render("index.html", &context).map_err(|render_error| {
        error!(event_name = "web.index.render_failed", error = %render_error, "index render failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Page unavailable</h1>".to_owned()))
    })?;

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response_headers.insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    Ok((response_headers, Html(body)))
}

async fn create_task(
    headers: HeaderMap,
    State(state): State<WebState>,
    Json(body): Json<TaskRequest>,
) -> ApiResult<TaskResponse> {
    let request_id = Uuid::new_v4().to_string();
    let text = body.text.trim();
    if text.is_empty() {
        let error = ApplicationError::InvalidInput("please enter a task request".to_owned());
        return Err(api_error(error.into_interface(request_id), Vec::new()));
    }

    let (session_id, runtime) = state.sessions.resolve(requested_session(&headers)).await;
    let sink = RecordingProgressSink::default();
    match runtime.create_task_from_text(text, &request_id, &sink).await {
        Ok(run) => {
            info!(
                event_name = "web.task.created",
                session_id = %session_id,
                correlation_id = %run.correlation_id,
                task_id = %run.created.id,
                "task created from web request"
            );
            let degraded = run.is_degraded();
            Ok(Json(TaskResponse {
                session_id,
                correlation_id: run.correlation_id,
                progress: commentary(&sink),
                record_fallback: run.record.is_fallback(),
                record: run.record.into_value(),
                context: run.context,
                description: run.description.into_value(),
                degraded,
                task: run.created,
            }))
        }
        Err(cause) => {
            warn!(
                event_name = "web.task.failed",
                session_id = %session_id,
                correlation_id = %request_id,
                error = %cause,
                "task creation failed for web request"
            );
            let error = ApplicationError::from(cause).into_interface(request_id);
            Err(api_error(error, commentary(&sink)))
        }
    }
}

async fn ask_question(
    headers: HeaderMap,
    State(state): State<WebState>,
    Json(body): Json<QuestionRequest>,
) -> ApiResult<AnswerResponse> {
    let question = body.question.trim();
    if question.is_empty() {
        let error = ApplicationError::InvalidInput("please enter a question".to_owned());
        return Err(api_error(error.into_interface(Uuid::new_v4().to_string()), Vec::new()));
    }

    let (session_id, runtime) = state.sessions.resolve(requested_session(&headers)).await;
    let sink = RecordingProgressSink::default();
    let answer = runtime.answer_question(question, &sink).await;

    Ok(Json(AnswerResponse {
        session_id,
        progress: commentary(&sink),
        fallback: answer.is_fallback(),
        answer: answer.into_value(),
    }))
}

fn commentary(sink: &RecordingProgressSink) -> Vec<String> {
    sink.events().iter().map(|event| event.commentary()).collect()
}

fn api_error(error: InterfaceError, progress: Vec<String>) -> (StatusCode, Json<ApiError>) {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Upstream { .. } => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ApiError {
            error: error.user_message().to_owned(),
            detail: error.message().to_owned(),
            correlation_id: error.correlation_id().to_owned(),
            progress,
        }),
    )
}
