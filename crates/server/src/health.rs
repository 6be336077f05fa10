use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use taskpilot_agent::AssistantRuntime;

#[derive(Clone)]
pub struct HealthState {
    runtime: AssistantRuntime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub knowledge_store: HealthCheck,
    pub index: HealthCheck,
    pub checked_at: String,
}

pub fn router(runtime: AssistantRuntime) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { runtime })
}

/// An unindexed collection is reported but does not make the service unready;
/// the index is built lazily on first use.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let knowledge = state.runtime.lifecycle().knowledge();
    let (knowledge_store, index) = match knowledge.indexed_chunk_count().await {
        Ok(count) => (
            HealthCheck { status: "ready", detail: "vector store reachable".to_owned() },
            match count {
                Some(chunks) => HealthCheck {
                    status: "ready",
                    detail: format!("{chunks} chunks indexed in `{}`", knowledge.collection()),
                },
                None => HealthCheck {
                    status: "pending",
                    detail: format!("collection `{}` not indexed yet", knowledge.collection()),
                },
            },
        ),
        Err(error) => (
            HealthCheck { status: "degraded", detail: format!("vector store check failed: {error}") },
            HealthCheck { status: "unknown", detail: "index status unavailable".to_owned() },
        ),
    };
    let ready = knowledge_store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "taskpilot-server runtime initialized".to_owned(),
        },
        knowledge_store,
        index,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
