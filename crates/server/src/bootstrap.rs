use std::sync::Arc;

use taskpilot_agent::{build_runtime, AssemblyError, AssistantRuntime};
use taskpilot_core::config::AppConfig;
use taskpilot_telegram::{
    ChatRouter, PollingRunner, ReconnectPolicy, TelegramHttpTransport, TransportError,
};
use thiserror::Error;
use tracing::info;

use crate::assistant::RuntimeAssistant;

pub struct Application {
    pub config: AppConfig,
    pub runtime: AssistantRuntime,
    pub telegram_runner: Option<PollingRunner>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("telegram transport setup failed: {0}")]
    Telegram(#[source] TransportError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let runtime = build_runtime(&config).await?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        knowledge_source = %config.knowledge.source_path.display(),
        "assistant runtime ready; knowledge loads on first use"
    );

    let telegram_runner = if config.telegram.enabled {
        let transport =
            Arc::new(TelegramHttpTransport::new(&config.telegram).map_err(BootstrapError::Telegram)?);
        let router = ChatRouter::new(Arc::new(RuntimeAssistant::new(runtime.clone())), transport.clone());
        Some(PollingRunner::new(
            transport,
            Arc::new(router),
            ReconnectPolicy::default(),
            config.telegram.poll_timeout_secs,
        ))
    } else {
        info!(
            event_name = "system.bootstrap.telegram_disabled",
            correlation_id = "bootstrap",
            "telegram front end disabled by configuration"
        );
        None
    };

    Ok(Application { config, runtime, telegram_runner })
}
