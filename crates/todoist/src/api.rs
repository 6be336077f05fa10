use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use taskpilot_core::config::TodoistConfig;
use taskpilot_core::errors::TaskCreationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub content: String,
    pub description: String,
    pub priority: u8,
}

/// Provider reply; every field is optional so normalisation can decide what is fatal.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
}

impl TaskResponse {
    /// Ids arrive as strings from REST v2 and as integers from older endpoints.
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn add_task(&self, task: &NewTask) -> Result<TaskResponse, TaskCreationError>;
}

pub struct TodoistApi {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
}

impl TodoistApi {
    pub fn new(config: &TodoistConfig) -> Result<Self, TaskCreationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| TaskCreationError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl TaskApi for TodoistApi {
    async fn add_task(&self, task: &NewTask) -> Result<TaskResponse, TaskCreationError> {
        let response = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .bearer_auth(self.api_token.expose_secret())
            .json(task)
            .send()
            .await
            .map_err(|error| TaskCreationError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TaskCreationError::Rejected { status: status.as_u16(), message });
        }

        response
            .json::<TaskResponse>()
            .await
            .map_err(|error| TaskCreationError::InvalidResponse(error.to_string()))
    }
}
