use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use taskpilot_core::config::{AppConfig, LoadOptions, RequiredKey};
use toml::Value;

/// One rendered field: dotted key, display value, and the env vars that can set it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: Vec<&'static str>,
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &[&'static str]) -> Self {
        Self { key, value: value.into(), env_keys: env_keys.to_vec() }
    }

    fn credential(required: RequiredKey, secret: &SecretString) -> Self {
        Self {
            key: required.config_key(),
            value: redact_secret(secret.expose_secret()),
            env_keys: vec![required.prefixed_env_var(), required.env_var()],
        }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            &field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let embedding_api_key = match &config.embedding.api_key {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset>".to_string(),
    };
    let log_file = config
        .logging
        .file
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<stdout>".to_string());

    vec![
        Field::new(
            "llm.provider",
            format!("{:?}", config.llm.provider),
            &["TASKPILOT_LLM_PROVIDER"],
        ),
        Field::new("llm.model", &config.llm.model, &["TASKPILOT_LLM_MODEL", "GROQ_MODEL"]),
        Field::new("llm.base_url", config.llm.endpoint(), &["TASKPILOT_LLM_BASE_URL"]),
        Field::credential(RequiredKey::LlmApiKey, &config.llm.api_key),
        Field::new(
            "embedding.provider",
            format!("{:?}", config.embedding.provider),
            &["TASKPILOT_EMBEDDING_PROVIDER"],
        ),
        Field::new("embedding.model", &config.embedding.model, &["TASKPILOT_EMBEDDING_MODEL"]),
        Field::new("embedding.api_key", embedding_api_key, &["TASKPILOT_EMBEDDING_API_KEY"]),
        Field::new(
            "knowledge.source_path",
            config.knowledge.source_path.display().to_string(),
            &["TASKPILOT_KNOWLEDGE_SOURCE_PATH"],
        ),
        Field::new(
            "knowledge.collection",
            &config.knowledge.collection,
            &["TASKPILOT_KNOWLEDGE_COLLECTION"],
        ),
        Field::new(
            "knowledge.store_url",
            &config.knowledge.store_url,
            &["TASKPILOT_KNOWLEDGE_STORE_URL"],
        ),
        Field::new(
            "knowledge.chunk_size",
            config.knowledge.chunk_size.to_string(),
            &["TASKPILOT_KNOWLEDGE_CHUNK_SIZE"],
        ),
        Field::new(
            "knowledge.top_k",
            config.knowledge.top_k.to_string(),
            &["TASKPILOT_KNOWLEDGE_TOP_K"],
        ),
        Field::new("todoist.base_url", &config.todoist.base_url, &["TASKPILOT_TODOIST_BASE_URL"]),
        Field::credential(RequiredKey::TodoistApiToken, &config.todoist.api_token),
        Field::new(
            "telegram.enabled",
            config.telegram.enabled.to_string(),
            &["TASKPILOT_TELEGRAM_ENABLED"],
        ),
        Field::credential(RequiredKey::TelegramBotToken, &config.telegram.bot_token),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["TASKPILOT_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["TASKPILOT_SERVER_PORT"]),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["TASKPILOT_LOGGING_LEVEL", "TASKPILOT_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["TASKPILOT_LOGGING_FORMAT", "TASKPILOT_LOG_FORMAT"],
        ),
        Field::new("logging.file", log_file, &["TASKPILOT_LOG_FILE"]),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("taskpilot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/taskpilot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of long secrets so operators can tell keys apart.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }

    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
