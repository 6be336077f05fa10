use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use taskpilot_core::config::TelegramConfig;

use crate::updates::Update;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport could not be built: {0}")]
    Build(String),
    #[error("update poll failed: {0}")]
    Poll(String),
    #[error("message send failed: {0}")]
    Send(String),
    #[error("bot api rejected `{method}` ({status}): {description}")]
    Api { method: &'static str, status: u16, description: String },
}

#[async_trait]
pub trait BotTransport: Send + Sync {
    /// Long-polls for updates with `update_id >= offset`. Passing a higher
    /// offset acknowledges everything below it. `None` means the stream ended.
    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Option<Vec<Update>>, TransportError>;
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}

pub struct TelegramHttpTransport {
    http: Client,
    api_base_url: String,
    bot_token: SecretString,
}

#[derive(Serialize)]
struct GetUpdatesBody {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl TelegramHttpTransport {
    /// The client timeout is kept above the long-poll window so an idle poll
    /// is never reported as a transport failure.
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs.saturating_add(10)))
            .build()
            .map_err(|error| TransportError::Build(error.to_string()))?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token.expose_secret())
    }

    async fn call<B, T>(
        &self,
        method: &'static str,
        body: &B,
        to_error: fn(String) -> TransportError,
    ) -> Result<T, TransportError>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| to_error(error.without_url().to_string()))?;
        let status = response.status().as_u16();
        let envelope: ApiEnvelope<T> =
            response.json().await.map_err(|error| to_error(error.without_url().to_string()))?;

        match envelope {
            ApiEnvelope { ok: true, result: Some(result), .. } => Ok(result),
            ApiEnvelope { description, .. } => Err(TransportError::Api {
                method,
                status,
                description: description.unwrap_or_else(|| "no description".to_owned()),
            }),
        }
    }
}

#[async_trait]
impl BotTransport for TelegramHttpTransport {
    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Option<Vec<Update>>, TransportError> {
        let body = GetUpdatesBody { offset, timeout: timeout_secs, allowed_updates: ["message"] };
        self.call("getUpdates", &body, TransportError::Poll).await.map(Some)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let body = SendMessageBody { chat_id, text };
        self.call::<_, serde_json::Value>("sendMessage", &body, TransportError::Send).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use taskpilot_core::config::TelegramConfig;

    use super::{BotTransport, TelegramHttpTransport, TransportError};
    use crate::updates::Update;

    type Calls = Arc<Mutex<Vec<(String, Value)>>>;

    async fn bot_api(calls: Calls) -> String {
        async fn method(
            State(calls): State<Calls>,
            Path((token, method)): Path<(String, String)>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            calls.lock().expect("calls lock").push((format!("{token}/{method}"), body));
            match method.as_str() {
                "getUpdates" => Json(json!({"ok": true, "result": [
                    {"update_id": 41, "message": {"chat": {"id": 7}, "text": "/task"}}
                ]})),
                "sendMessage" => Json(json!({"ok": true, "result": {"message_id": 1}})),
                _ => Json(json!({"ok": false, "description": "Not Found: method not found"})),
            }
        }

        let app = Router::new().route("/{token}/{method}", post(method)).with_state(calls);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}")
    }

    fn config(api_base_url: String) -> TelegramConfig {
        TelegramConfig {
            bot_token: SecretString::from("123:abc"),
            api_base_url,
            enabled: true,
            poll_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn polls_with_offset_and_sends_messages() {
        let calls = Calls::default();
        let transport = TelegramHttpTransport::new(&config(bot_api(calls.clone()).await))
            .expect("transport");

        let updates = transport.get_updates(41, 1).await.expect("poll").expect("updates");
        transport.send_message(7, "Searching SOP...").await.expect("send");

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 41);
        let calls = calls.lock().expect("calls lock").clone();
        assert_eq!(calls[0].0, "bot123:abc/getUpdates");
        assert_eq!(calls[0].1["offset"], 41);
        assert_eq!(calls[1].0, "bot123:abc/sendMessage");
        assert_eq!(calls[1].1, json!({"chat_id": 7, "text": "Searching SOP..."}));
    }

    #[tokio::test]
    async fn rejection_without_result_carries_the_api_description() {
        let transport = TelegramHttpTransport::new(&config(bot_api(Calls::default()).await))
            .expect("transport");

        let error = transport
            .call::<_, Vec<Update>>("deleteWebhook", &json!({}), TransportError::Send)
            .await
            .expect_err("unknown method");

        assert_eq!(
            error,
            TransportError::Api {
                method: "deleteWebhook",
                status: 200,
                description: "Not Found: method not found".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn unreachable_api_is_a_poll_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        drop(listener);

        let transport =
            TelegramHttpTransport::new(&config(format!("http://{address}"))).expect("transport");
        let error = transport.get_updates(0, 1).await.expect_err("no server");
        assert!(matches!(error, TransportError::Poll(_)));
    }
}
