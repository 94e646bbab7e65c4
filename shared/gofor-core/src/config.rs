//! Configuration shared by every service process

use crate::error::{GoforError, Result};
use serde::Deserialize;
use std::env;

/// Process identity reported by the runtime when a service starts
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub http_bind: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "unknown".to_string()),
            http_bind: http_bind_from_env()?,
        })
    }
}

/// Resolve the HTTP listen address.
///
/// `HTTP_BIND` wins when set; otherwise the service binds every interface on
/// `PORT` (3000 when unset).
pub fn http_bind_from_env() -> Result<String> {
    if let Ok(bind) = env::var("HTTP_BIND") {
        return Ok(bind);
    }
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| GoforError::Config(format!("Invalid PORT: {}", e)))?;
    Ok(format!("0.0.0.0:{}", port))
}

/// Read a numeric environment variable, falling back to `default` when unset.
pub fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GoforError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_default_when_unset() {
        let value: u64 = parse_env("GOFOR_TEST_UNSET_VALUE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("GOFOR_TEST_BAD_NUMBER", "forty");
        let err = parse_env::<u64>("GOFOR_TEST_BAD_NUMBER", 1).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("GOFOR_TEST_BAD_NUMBER"));
    }

    #[test]
    fn test_parse_env_trims_whitespace() {
        std::env::set_var("GOFOR_TEST_PADDED_NUMBER", " 15 ");
        let value: u32 = parse_env("GOFOR_TEST_PADDED_NUMBER", 0).unwrap();
        assert_eq!(value, 15);
    }
}
