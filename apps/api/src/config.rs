use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub cors_allow_origin: HeaderValue,
    pub max_upload_bytes: usize,
    pub upload_dir: PathBuf,
    pub extract_timeout: Duration,
    pub completion_timeout: Duration,
    /// Include library diagnostics as `details` in error bodies. Off in production.
    pub expose_error_details: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let cors_allow_origin = env_or("CORS_ALLOW_ORIGIN", "*".to_string())?;

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL.to_string())?
                .trim_end_matches('/')
                .to_string(),
            port: env_or("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info".to_string())?,
            cors_allow_origin: HeaderValue::from_str(&cors_allow_origin)
                .context("CORS_ALLOW_ORIGIN must be a valid header value")?,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            extract_timeout: Duration::from_secs(env_or(
                "EXTRACT_TIMEOUT_SECS",
                DEFAULT_EXTRACT_TIMEOUT_SECS,
            )?),
            completion_timeout: Duration::from_secs(env_or(
                "COMPLETION_TIMEOUT_SECS",
                DEFAULT_COMPLETION_TIMEOUT_SECS,
            )?),
            expose_error_details: env_or("EXPOSE_ERROR_DETAILS", false)?,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_base_url", &self.openai_base_url)
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("cors_allow_origin", &self.cors_allow_origin)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("upload_dir", &self.upload_dir)
            .field("extract_timeout", &self.extract_timeout)
            .field("completion_timeout", &self.completion_timeout)
            .field("expose_error_details", &self.expose_error_details)
            .finish()
    }
}

fn require_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has an invalid value: '{raw}'"))
}
