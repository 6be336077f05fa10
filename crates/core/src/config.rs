use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub knowledge: KnowledgeConfig,
    pub todoist: TodoistConfig,
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub source_path: PathBuf,
    pub collection: String,
    pub store_url: String,
    pub chunk_size: usize,
    pub top_k: usize,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TodoistConfig {
    pub api_token: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub enabled: bool,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Hashing,
    OpenAi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Credentials the process refuses to start without.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequiredKey {
    LlmApiKey,
    TodoistApiToken,
    TelegramBotToken,
}

impl RequiredKey {
    pub const ALL: [RequiredKey; 3] =
        [RequiredKey::LlmApiKey, RequiredKey::TodoistApiToken, RequiredKey::TelegramBotToken];

    pub fn config_key(&self) -> &'static str {
        match self {
            Self::LlmApiKey => "llm.api_key",
            Self::TodoistApiToken => "todoist.api_token",
            Self::TelegramBotToken => "telegram.bot_token",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            Self::LlmApiKey => "GROQ_API_KEY",
            Self::TodoistApiToken => "TODOIST_API_KEY",
            Self::TelegramBotToken => "TELEGRAM_BOT_TOKEN",
        }
    }

    pub fn prefixed_env_var(&self) -> &'static str {
        match self {
            Self::LlmApiKey => "TASKPILOT_LLM_API_KEY",
            Self::TodoistApiToken => "TASKPILOT_TODOIST_API_TOKEN",
            Self::TelegramBotToken => "TASKPILOT_TELEGRAM_BOT_TOKEN",
        }
    }
}

impl fmt::Display for RequiredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.config_key(), self.env_var())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub todoist_api_token: Option<String>,
    pub todoist_base_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_enabled: Option<bool>,
    pub knowledge_source_path: Option<PathBuf>,
    pub knowledge_store_url: Option<String>,
    pub knowledge_collection: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("missing required credentials: {}", render_keys(.0))]
    MissingRequired(Vec<RequiredKey>),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

fn render_keys(keys: &[RequiredKey]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Groq,
                api_key: String::new().into(),
                base_url: None,
                model: "llama-3.1-8b-instant".to_string(),
                timeout_secs: 60,
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::Hashing,
                model: "all-MiniLM-L6-v2".to_string(),
                base_url: None,
                api_key: None,
                dimensions: 384,
                timeout_secs: 30,
            },
            knowledge: KnowledgeConfig {
                source_path: PathBuf::from("data/sop_expenses.txt"),
                collection: "sop_knowledge_base".to_string(),
                store_url: "sqlite://taskpilot.db?mode=rwc".to_string(),
                chunk_size: 500,
                top_k: 3,
                max_connections: 5,
                timeout_secs: 30,
            },
            todoist: TodoistConfig {
                api_token: String::new().into(),
                base_url: "https://api.todoist.com/rest/v2".to_string(),
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                enabled: true,
                poll_timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8501,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Compact,
                file: Some(PathBuf::from("logs/app.log")),
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            other => Err(ConfigError::Validation(format!(
                "unsupported embedding provider `{other}` (expected hashing|openai)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn endpoint(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("taskpilot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Required credentials that are absent or blank, in declaration order.
    pub fn missing_required_keys(&self) -> Vec<RequiredKey> {
        RequiredKey::ALL
            .into_iter()
            .filter(|key| {
                let value = match key {
                    RequiredKey::LlmApiKey => self.llm.api_key.expose_secret(),
                    RequiredKey::TodoistApiToken => self.todoist.api_token.expose_secret(),
                    RequiredKey::TelegramBotToken => self.telegram.bot_token.expose_secret(),
                };
                value.trim().is_empty()
            })
            .collect()
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = secret_value(llm_api_key_value);
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(provider) = embedding.provider {
                self.embedding.provider = provider;
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = Some(base_url);
            }
            if let Some(embedding_api_key_value) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(embedding_api_key_value));
            }
            if let Some(dimensions) = embedding.dimensions {
                self.embedding.dimensions = dimensions;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(source_path) = knowledge.source_path {
                self.knowledge.source_path = source_path;
            }
            if let Some(collection) = knowledge.collection {
                self.knowledge.collection = collection;
            }
            if let Some(store_url) = knowledge.store_url {
                self.knowledge.store_url = store_url;
            }
            if let Some(chunk_size) = knowledge.chunk_size {
                self.knowledge.chunk_size = chunk_size;
            }
            if let Some(top_k) = knowledge.top_k {
                self.knowledge.top_k = top_k;
            }
            if let Some(max_connections) = knowledge.max_connections {
                self.knowledge.max_connections = max_connections;
            }
            if let Some(timeout_secs) = knowledge.timeout_secs {
                self.knowledge.timeout_secs = timeout_secs;
            }
        }

        if let Some(todoist) = patch.todoist {
            if let Some(todoist_token_value) = todoist.api_token {
                self.todoist.api_token = secret_value(todoist_token_value);
            }
            if let Some(base_url) = todoist.base_url {
                self.todoist.base_url = base_url;
            }
            if let Some(timeout_secs) = todoist.timeout_secs {
                self.todoist.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(telegram_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(telegram_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(enabled) = telegram.enabled {
                self.telegram.enabled = enabled;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
            if let Some(file) = logging.file {
                self.logging.file = if file.trim().is_empty() { None } else { Some(file.into()) };
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        for key in RequiredKey::ALL {
            let value = read_env(key.prefixed_env_var()).or_else(|| read_env(key.env_var()));
            let Some(value) = value else { continue };
            match key {
                RequiredKey::LlmApiKey => self.llm.api_key = secret_value(value),
                RequiredKey::TodoistApiToken => self.todoist.api_token = secret_value(value),
                RequiredKey::TelegramBotToken => self.telegram.bot_token = secret_value(value),
            }
        }

        if let Some(value) = read_env("TASKPILOT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("TASKPILOT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        let llm_model = read_env("TASKPILOT_LLM_MODEL").or_else(|| read_env("GROQ_MODEL"));
        if let Some(value) = llm_model {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TASKPILOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TASKPILOT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TASKPILOT_EMBEDDING_PROVIDER") {
            self.embedding.provider = value.parse()?;
        }
        if let Some(value) = read_env("TASKPILOT_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("TASKPILOT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(value);
        }
        if let Some(value) = read_env("TASKPILOT_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TASKPILOT_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = parse_usize("TASKPILOT_EMBEDDING_DIMENSIONS", &value)?;
        }

        if let Some(value) = read_env("TASKPILOT_KNOWLEDGE_SOURCE_PATH") {
            self.knowledge.source_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("TASKPILOT_KNOWLEDGE_COLLECTION") {
            self.knowledge.collection = value;
        }
        if let Some(value) = read_env("TASKPILOT_KNOWLEDGE_STORE_URL") {
            self.knowledge.store_url = value;
        }
        if let Some(value) = read_env("TASKPILOT_KNOWLEDGE_CHUNK_SIZE") {
            self.knowledge.chunk_size = parse_usize("TASKPILOT_KNOWLEDGE_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = read_env("TASKPILOT_KNOWLEDGE_TOP_K") {
            self.knowledge.top_k = parse_usize("TASKPILOT_KNOWLEDGE_TOP_K", &value)?;
        }

        if let Some(value) = read_env("TASKPILOT_TODOIST_BASE_URL") {
            self.todoist.base_url = value;
        }

        if let Some(value) = read_env("TASKPILOT_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("TASKPILOT_TELEGRAM_ENABLED") {
            self.telegram.enabled = parse_bool("TASKPILOT_TELEGRAM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("TASKPILOT_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("TASKPILOT_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TASKPILOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TASKPILOT_SERVER_PORT") {
            self.server.port = parse_u16("TASKPILOT_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("TASKPILOT_LOGGING_LEVEL").or_else(|| read_env("TASKPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TASKPILOT_LOGGING_FORMAT").or_else(|| read_env("TASKPILOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }
        if let Some(value) = read_env("TASKPILOT_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(value));
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = secret_value(llm_api_key);
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(todoist_api_token) = overrides.todoist_api_token {
            self.todoist.api_token = secret_value(todoist_api_token);
        }
        if let Some(todoist_base_url) = overrides.todoist_base_url {
            self.todoist.base_url = todoist_base_url;
        }
        if let Some(telegram_bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(telegram_bot_token);
        }
        if let Some(enabled) = overrides.telegram_enabled {
            self.telegram.enabled = enabled;
        }
        if let Some(source_path) = overrides.knowledge_source_path {
            self.knowledge.source_path = source_path;
        }
        if let Some(store_url) = overrides.knowledge_store_url {
            self.knowledge.store_url = store_url;
        }
        if let Some(collection) = overrides.knowledge_collection {
            self.knowledge.collection = collection;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.missing_required_keys();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired(missing));
        }

        validate_llm(&self.llm)?;
        validate_embedding(&self.embedding)?;
        validate_knowledge(&self.knowledge)?;
        validate_todoist(&self.todoist)?;
        validate_telegram(&self.telegram)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("taskpilot.toml"), PathBuf::from("config/taskpilot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{field} must start with http:// or https://")))
    }
}

fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{field} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_timeout("llm.timeout_secs", llm.timeout_secs)?;
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    validate_http_url("llm.base_url", llm.endpoint())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    validate_timeout("embedding.timeout_secs", embedding.timeout_secs)?;
    match embedding.provider {
        EmbeddingProvider::Hashing => {
            if embedding.dimensions == 0 {
                return Err(ConfigError::Validation(
                    "embedding.dimensions must be greater than zero".to_string(),
                ));
            }
        }
        EmbeddingProvider::OpenAi => {
            let Some(base_url) = embedding.base_url.as_deref() else {
                return Err(ConfigError::Validation(
                    "embedding.base_url is required for the openai embedding provider"
                        .to_string(),
                ));
            };
            validate_http_url("embedding.base_url", base_url)?;
        }
    }
    Ok(())
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    let url = knowledge.store_url.trim();
    let supported = url.starts_with("sqlite:") || url == "memory://";
    if !supported {
        return Err(ConfigError::Validation(
            "knowledge.store_url must be a sqlite URL (`sqlite://...`, `sqlite::memory:`) or `memory://`"
                .to_string(),
        ));
    }

    if knowledge.collection.trim().is_empty() {
        return Err(ConfigError::Validation(
            "knowledge.collection must not be empty".to_string(),
        ));
    }
    if knowledge.chunk_size == 0 {
        return Err(ConfigError::Validation(
            "knowledge.chunk_size must be greater than zero".to_string(),
        ));
    }
    if knowledge.top_k == 0 {
        return Err(ConfigError::Validation(
            "knowledge.top_k must be greater than zero".to_string(),
        ));
    }
    if knowledge.max_connections == 0 {
        return Err(ConfigError::Validation(
            "knowledge.max_connections must be greater than zero".to_string(),
        ));
    }
    validate_timeout("knowledge.timeout_secs", knowledge.timeout_secs)
}

fn validate_todoist(todoist: &TodoistConfig) -> Result<(), ConfigError> {
    validate_timeout("todoist.timeout_secs", todoist.timeout_secs)?;
    validate_http_url("todoist.base_url", &todoist.base_url)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    if telegram.poll_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be at most 60".to_string(),
        ));
    }
    validate_http_url("telegram.api_base_url", &telegram.api_base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    knowledge: Option<KnowledgePatch>,
    todoist: Option<TodoistPatch>,
    telegram: Option<TelegramPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    provider: Option<EmbeddingProvider>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    dimensions: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    source_path: Option<PathBuf>,
    collection: Option<String>,
    store_url: Option<String>,
    chunk_size: Option<usize>,
    top_k: Option<usize>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TodoistPatch {
    api_token: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    enabled: Option<bool>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
    file: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LlmProvider, RequiredKey,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const CREDENTIAL_VARS: &[&str] = &[
        "GROQ_API_KEY",
        "TODOIST_API_KEY",
        "TELEGRAM_BOT_TOKEN",
        "TASKPILOT_LLM_API_KEY",
        "TASKPILOT_TODOIST_API_TOKEN",
        "TASKPILOT_TELEGRAM_BOT_TOKEN",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn set_credentials() {
        env::set_var("GROQ_API_KEY", "gsk-test");
        env::set_var("TODOIST_API_KEY", "todoist-test");
        env::set_var("TELEGRAM_BOT_TOKEN", "123:telegram-test");
    }

    #[test]
    fn missing_required_keys_is_pure_and_ordered() {
        let config = AppConfig::default();
        assert_eq!(
            config.missing_required_keys(),
            vec![
                RequiredKey::LlmApiKey,
                RequiredKey::TodoistApiToken,
                RequiredKey::TelegramBotToken
            ]
        );

        let mut partial = AppConfig::default();
        partial.llm.api_key = "gsk-present".to_string().into();
        partial.telegram.bot_token = "   ".to_string().into();
        assert_eq!(
            partial.missing_required_keys(),
            vec![RequiredKey::TodoistApiToken, RequiredKey::TelegramBotToken]
        );
    }

    #[test]
    fn load_fails_fast_naming_exactly_the_missing_keys() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(CREDENTIAL_VARS);
        env::set_var("TODOIST_API_KEY", "todoist-test");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected missing credential failure".to_string()),
                Err(error) => error,
            };
            let missing = match &error {
                ConfigError::MissingRequired(keys) => keys.clone(),
                other => return Err(format!("unexpected error: {other}")),
            };
            ensure(
                missing == vec![RequiredKey::LlmApiKey, RequiredKey::TelegramBotToken],
                "only the llm key and telegram token should be reported",
            )?;
            let message = error.to_string();
            ensure(message.contains("GROQ_API_KEY"), "message should name GROQ_API_KEY")?;
            ensure(
                message.contains("TELEGRAM_BOT_TOKEN"),
                "message should name TELEGRAM_BOT_TOKEN",
            )?;
            ensure(!message.contains("TODOIST_API_KEY"), "todoist key is present")
        })();

        clear_vars(CREDENTIAL_VARS);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(CREDENTIAL_VARS);

        env::set_var("TEST_TASKPILOT_LLM_KEY", "gsk-from-env");
        env::set_var("TEST_TASKPILOT_TODOIST", "todoist-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("taskpilot.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_TASKPILOT_LLM_KEY}"

[todoist]
api_token = "${TEST_TASKPILOT_TODOIST}"

[telegram]
bot_token = "123:inline"
enabled = false

[knowledge]
collection = "expenses"
chunk_size = 320
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.expose_secret() == "gsk-from-env",
                "llm key should be interpolated from environment",
            )?;
            ensure(
                config.todoist.api_token.expose_secret() == "todoist-from-env",
                "todoist token should be interpolated from environment",
            )?;
            ensure(!config.telegram.enabled, "telegram should be disabled by file")?;
            ensure(config.knowledge.collection == "expenses", "collection from file")?;
            ensure(config.knowledge.chunk_size == 320, "chunk size from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_TASKPILOT_LLM_KEY", "TEST_TASKPILOT_TODOIST"]);
        result
    }

    #[test]
    fn prefixed_env_vars_win_over_legacy_names() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(CREDENTIAL_VARS);
        set_credentials();
        env::set_var("TASKPILOT_LLM_API_KEY", "gsk-prefixed");
        env::set_var("TASKPILOT_LOG_LEVEL", "warn");
        env::set_var("TASKPILOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.expose_secret() == "gsk-prefixed",
                "prefixed llm key should win",
            )?;
            ensure(
                config.todoist.api_token.expose_secret() == "todoist-test",
                "legacy todoist name should be honoured",
            )?;
            ensure(config.logging.level == "warn", "warn log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(CREDENTIAL_VARS);
        clear_vars(&["TASKPILOT_LOG_LEVEL", "TASKPILOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(CREDENTIAL_VARS);
        set_credentials();
        env::set_var("TASKPILOT_LLM_MODEL", "model-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("taskpilot.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "open_ai"
model = "model-from-file"

[knowledge]
store_url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    knowledge_store_url: Some("memory://".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.knowledge.store_url == "memory://", "override store url should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.llm.model == "model-from-env", "env model should win over file")?;
            ensure(config.llm.provider == LlmProvider::OpenAi, "provider from file")?;
            ensure(
                config.llm.endpoint() == "https://api.openai.com/v1",
                "provider default endpoint should apply",
            )?;
            Ok(())
        })();

        clear_vars(CREDENTIAL_VARS);
        clear_vars(&["TASKPILOT_LLM_MODEL"]);
        result
    }

    #[test]
    fn validation_rejects_unsupported_store_url() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(CREDENTIAL_VARS);
        set_credentials();

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    knowledge_store_url: Some("postgres://db".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            }) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("knowledge.store_url")
            );
            ensure(has_message, "validation failure should mention knowledge.store_url")
        })();

        clear_vars(CREDENTIAL_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(CREDENTIAL_VARS);
        env::set_var("GROQ_API_KEY", "gsk-secret-value");
        env::set_var("TODOIST_API_KEY", "todoist-secret-value");
        env::set_var("TELEGRAM_BOT_TOKEN", "123:telegram-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("gsk-secret-value"), "debug should not contain llm key")?;
            ensure(
                !debug.contains("todoist-secret-value"),
                "debug should not contain todoist token",
            )?;
            ensure(
                !debug.contains("telegram-secret-value"),
                "debug should not contain telegram token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(CREDENTIAL_VARS);
        result
    }
}
