//! Runtime configuration read from `TASKLY_*` environment variables.

use std::time::Duration;
use tracing::warn;

use crate::assist::AiModel;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_SUGGEST_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 12;
pub const DEFAULT_SUGGEST_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct TasklyConfig {
    /// `None` means TASKLY_DB_PATH or ~/.taskly/taskly.redb, resolved by the db
    pub db_path: Option<String>,
    /// Without a key every AI feature answers with its fallback
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub default_model: AiModel,
    pub suggest_timeout: Duration,
    pub chat_timeout: Duration,
    pub suggest_cache_ttl: Duration,
}

impl Default for TasklyConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            llm_api_key: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            default_model: AiModel::Claude,
            suggest_timeout: Duration::from_secs(DEFAULT_SUGGEST_TIMEOUT_SECS),
            chat_timeout: Duration::from_secs(DEFAULT_CHAT_TIMEOUT_SECS),
            suggest_cache_ttl: Duration::from_secs(DEFAULT_SUGGEST_CACHE_TTL_SECS),
        }
    }
}

impl TasklyConfig {
    /// Read the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| match get(key) {
            None => default,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!("Ignoring {}={:?}: not a whole number of seconds", key, raw);
                    default
                }
            },
        };

        let default_model = match get("TASKLY_DEFAULT_MODEL") {
            None => defaults.default_model,
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Ignoring TASKLY_DEFAULT_MODEL: {}", e);
                defaults.default_model
            }),
        };

        Self {
            db_path: get("TASKLY_DB_PATH"),
            llm_api_key: get("TASKLY_LLM_API_KEY"),
            llm_base_url: get("TASKLY_LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            default_model,
            suggest_timeout: secs("TASKLY_SUGGEST_TIMEOUT_SECS", defaults.suggest_timeout),
            chat_timeout: secs("TASKLY_CHAT_TIMEOUT_SECS", defaults.chat_timeout),
            suggest_cache_ttl: secs("TASKLY_SUGGEST_CACHE_TTL_SECS", defaults.suggest_cache_ttl),
        }
    }
}
