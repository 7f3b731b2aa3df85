use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::dossier::pipeline::PipelineOptions;
use crate::llm_client::LlmConfig;

const DEFAULT_GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is set but cannot be parsed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Empty when unset; extraction calls then fail with an authentication error.
    pub groq_api_key: String,
    pub groq_model: String,
    pub groq_api_url: String,
    pub llm_timeout_secs: u64,
    pub rate_limit_backoff_ms: u64,
    pub max_upload_mb: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            groq_api_key: std::env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env_or("GROQ_MODEL", DEFAULT_GROQ_MODEL.to_string())?,
            groq_api_url: env_or("GROQ_API_URL", DEFAULT_GROQ_API_URL.to_string())?,
            llm_timeout_secs: env_or("LLM_TIMEOUT_SECS", 60)?,
            rate_limit_backoff_ms: env_or("LLM_RATE_LIMIT_BACKOFF_MS", 2000)?,
            max_upload_mb: env_or("MAX_UPLOAD_MB", 10)?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            endpoint: self.groq_api_url.clone(),
            api_key: self.groq_api_key.trim().to_string(),
            model: self.groq_model.clone(),
            timeout: Duration::from_secs(self.llm_timeout_secs),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        _ => Ok(default),
    }
}
