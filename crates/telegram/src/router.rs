use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use taskpilot_core::domain::progress::{ProgressEvent, ProgressSink};
use taskpilot_core::domain::task::CreatedTask;
use taskpilot_core::errors::TaskCreationError;

use crate::commands::BotCommand;
use crate::messages::{
    answer_text, progress_text, task_created_text, task_failed_text, ASK_MODE_TEXT,
    CHOOSE_ACTION_TEXT, START_TEXT, TASK_MODE_TEXT, UNEXPECTED_ERROR_TEXT,
};
use crate::transport::{BotTransport, TransportError};
use crate::updates::{BotEvent, Update};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatMode {
    Task,
    Ask,
}

/// Pipelines the bot drives; implemented over the assistant runtime by the host.
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn create_task(
        &self,
        text: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CreatedTask, TaskCreationError>;
    async fn answer_question(&self, question: &str, sink: &dyn ProgressSink) -> String;
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("reply to chat {chat_id} failed: {source}")]
    Reply { chat_id: i64, source: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Replied,
    Ignored,
}

/// Routes classified updates; chat modes persist for the life of the router.
pub struct ChatRouter {
    service: Arc<dyn AssistantService>,
    transport: Arc<dyn BotTransport>,
    modes: RwLock<HashMap<i64, ChatMode>>,
}

impl ChatRouter {
    pub fn new(service: Arc<dyn AssistantService>, transport: Arc<dyn BotTransport>) -> Self {
        Self { service, transport, modes: RwLock::new(HashMap::new()) }
    }

    pub async fn mode(&self, chat_id: i64) -> Option<ChatMode> {
        self.modes.read().await.get(&chat_id).copied()
    }

    /// Handles one update; a failed reply gets a best-effort apology.
    pub async fn handle(&self, update: &Update) -> RouteOutcome {
        let event = update.classify();
        match self.route(&event).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "telegram.route.failed",
                    update_id = update.update_id,
                    error = %error,
                    "update handling failed"
                );
                if let Some(chat_id) = event.chat_id() {
                    if let Err(error) = self.transport.send_message(chat_id, UNEXPECTED_ERROR_TEXT).await {
                        warn!(
                            event_name = "telegram.reply.failed",
                            chat_id,
                            error = %error,
                            "could not deliver error notice"
                        );
                    }
                }
                RouteOutcome::Replied
            }
        }
    }

    pub async fn route(&self, event: &BotEvent) -> Result<RouteOutcome, RouteError> {
        match event {
            BotEvent::Command { chat_id, command } => self.command(*chat_id, command).await,
            BotEvent::Text { chat_id, text } => self.text(*chat_id, text).await,
            BotEvent::Unsupported => Ok(RouteOutcome::Ignored),
        }
    }

    async fn command(&self, chat_id: i64, command: &BotCommand) -> Result<RouteOutcome, RouteError> {
        let reply = match command {
            BotCommand::Start => START_TEXT,
            BotCommand::Task => {
                self.modes.write().await.insert(chat_id, ChatMode::Task);
                TASK_MODE_TEXT
            }
            BotCommand::Ask => {
                self.modes.write().await.insert(chat_id, ChatMode::Ask);
                ASK_MODE_TEXT
            }
            BotCommand::Unknown(name) => {
                debug!(event_name = "telegram.command.unknown", chat_id, command = %name, "ignoring command");
                return Ok(RouteOutcome::Ignored);
            }
        };

        info!(event_name = "telegram.command.handled", chat_id, command = command.name(), "command handled");
        self.reply(chat_id, reply).await?;
        Ok(RouteOutcome::Replied)
    }

    async fn text(&self, chat_id: i64, text: &str) -> Result<RouteOutcome, RouteError> {
        let Some(mode) = self.mode(chat_id).await else {
            self.reply(chat_id, CHOOSE_ACTION_TEXT).await?;
            return Ok(RouteOutcome::Replied);
        };

        let sink = ChatProgressSink { transport: self.transport.clone(), chat_id, mode };
        match mode {
            ChatMode::Task => {
                let reply = match self.service.create_task(text, &sink).await {
                    Ok(task) => task_created_text(&task),
                    Err(error) => task_failed_text(&error),
                };
                self.reply(chat_id, &reply).await?;
            }
            ChatMode::Ask => {
                let answer = self.service.answer_question(text, &sink).await;
                self.reply(chat_id, &answer_text(&answer)).await?;
            }
        }
        Ok(RouteOutcome::Replied)
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), RouteError> {
        self.transport
            .send_message(chat_id, text)
            .await
            .map_err(|source| RouteError::Reply { chat_id, source })
    }
}

/// Posts progress commentary into the chat. Delivery failures are logged only.
struct ChatProgressSink {
    transport: Arc<dyn BotTransport>,
    chat_id: i64,
    mode: ChatMode,
}

#[async_trait]
impl ProgressSink for ChatProgressSink {
    async fn emit(&self, event: ProgressEvent) {
        let Some(text) = progress_text(&event, self.mode) else {
            return;
        };
        if let Err(error) = self.transport.send_message(self.chat_id, &text).await {
            warn!(
                event_name = "telegram.progress.failed",
                chat_id = self.chat_id,
                step = event.step(),
                error = %error,
                "progress message not delivered"
            );
        }
    }
}
