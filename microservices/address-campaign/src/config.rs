//! Address Campaign Configuration

use gofor_core::config::{http_bind_from_env, parse_env};
use gofor_core::{GoforError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::assistant::GeminiConfig;

/// Where the campaign snapshot lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    File,
    Postgres,
    Memory,
}

impl FromStr for StateBackend {
    type Err = GoforError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(GoforError::Config(format!(
                "Invalid STATE_BACKEND: {} (expected file, postgres or memory)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CampaignConfig {
    pub http_bind: String,
    pub static_dir: PathBuf,
    pub state_backend: StateBackend,
    pub state_dir: PathBuf,
    pub database_url: String,
    pub db_pool_size: usize,
    pub gemini: GeminiConfig,
    pub webhook_timeout_secs: u64,
    /// Number the messaging session reports once connected
    pub session_phone: String,
}

impl CampaignConfig {
    pub fn from_env() -> Result<Self> {
        let state_backend = match env::var("STATE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StateBackend::File,
        };

        Ok(Self {
            http_bind: http_bind_from_env()?,
            static_dir: env::var("STATIC_DIR")
                .unwrap_or_else(|_| "dist".to_string())
                .into(),
            state_backend,
            state_dir: env::var("STATE_DIR")
                .unwrap_or_else(|_| ".".to_string())
                .into(),
            database_url: database_url_from_env()?,
            db_pool_size: parse_env("DB_POOL_SIZE", 8)?,
            gemini: GeminiConfig {
                base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                model: env::var("GEMINI_MODEL")
                    .unwrap_or_else(|_| "gemini-3-flash-preview".to_string()),
                default_api_key: env::var("GEMINI_API_KEY")
                    .or_else(|_| env::var("API_KEY"))
                    .unwrap_or_default(),
                request_timeout_secs: parse_env("GEMINI_TIMEOUT_SECS", 30)?,
            },
            webhook_timeout_secs: parse_env("WEBHOOK_TIMEOUT_SECS", 10)?,
            session_phone: env::var("SESSION_PHONE")
                .unwrap_or_else(|_| "+212 661-001122".to_string()),
        })
    }
}

/// `DATABASE_URL` wins; otherwise the URL is assembled from the `DB_*` parts
fn database_url_from_env() -> Result<String> {
    if let Ok(url) = env::var("DATABASE_URL") {
        return Ok(url);
    }
    let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = parse_env("DB_PORT", 5432)?;
    let name = env::var("DB_NAME").unwrap_or_else(|_| "gofor360".to_string());
    let user = env::var("DB_USER").unwrap_or_else(|_| "gofor".to_string());
    let pass = env::var("DB_PASS").unwrap_or_else(|_| "password".to_string());
    Ok(format!("postgres://{}:{}@{}:{}/{}", user, pass, host, port, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("file".parse::<StateBackend>().unwrap(), StateBackend::File);
        assert_eq!(" Postgres ".parse::<StateBackend>().unwrap(), StateBackend::Postgres);
        assert_eq!("postgresql".parse::<StateBackend>().unwrap(), StateBackend::Postgres);
        assert_eq!("MEMORY".parse::<StateBackend>().unwrap(), StateBackend::Memory);
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let err = "redis".parse::<StateBackend>().unwrap_err();
        assert!(matches!(err, GoforError::Config(_)));
        assert!(err.to_string().contains("redis"));
    }
}
