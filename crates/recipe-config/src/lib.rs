// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Environment configuration loading and validation.

use std::env;
use std::fmt;
use thiserror::Error;

/// A window, in milliseconds, above which a rate-limit configuration is
/// unusual enough to warn about rather than silently accept.
pub const LARGE_RATE_LIMIT_WINDOW_MS: u64 = 3_600_000;

/// Resolved, validated configuration for the daemon process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub ws_port: u16,
    pub ws_host: Option<String>,
    pub database_url: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub jwt_secret: String,
    pub api_key: Option<String>,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub max_file_size_bytes: u64,
    pub max_request_size_bytes: u64,
}

/// A non-fatal configuration issue worth surfacing in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A field fell back to its documented default.
    UsingDefault { field: &'static str, default: String },
    /// A rate-limit window is unusually large.
    LargeRateLimitWindow { ms: u64 },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsingDefault { field, default } => write!(f, "{field} not set, using default {default}"),
            Self::LargeRateLimitWindow { ms } => {
                write!(f, "RATE_LIMIT_WINDOW_MS={ms} is unusually large (> 1 hour)")
            }
        }
    }
}

/// A fatal configuration problem; the process must not start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required but was not set")]
    MissingRequired(&'static str),
    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_or_invalid<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid { field, message: format!("could not parse {raw:?}") })
}

/// Load configuration from the process environment, applying the
/// documented defaults and returning any non-fatal warnings alongside
/// the resolved config.
pub fn load_config() -> Result<(AppConfig, Vec<ConfigWarning>), ConfigError> {
    let mut warnings = Vec::new();

    let port = match env_var("PORT") {
        Some(raw) => parse_or_invalid("PORT", &raw)?,
        None => {
            warnings.push(ConfigWarning::UsingDefault { field: "PORT", default: "3000".to_string() });
            3000
        }
    };

    let ws_port = match env_var("WS_PORT") {
        Some(raw) => parse_or_invalid("WS_PORT", &raw)?,
        None => {
            warnings.push(ConfigWarning::UsingDefault { field: "WS_PORT", default: "8080".to_string() });
            8080
        }
    };

    let ws_host = env_var("WS_HOST");

    let database_url = env_var("DATABASE_URL").ok_or(ConfigError::MissingRequired("DATABASE_URL"))?;
    recipe_validate::validate_database_url(&database_url)
        .map_err(|_| ConfigError::Invalid { field: "DATABASE_URL", message: recipe_validate::MSG_INVALID_DATABASE_URL.to_string() })?;

    let redis_host = env_var("REDIS_HOST").unwrap_or_else(|| {
        warnings.push(ConfigWarning::UsingDefault { field: "REDIS_HOST", default: "localhost".to_string() });
        "localhost".to_string()
    });

    let redis_port = match env_var("REDIS_PORT") {
        Some(raw) => parse_or_invalid("REDIS_PORT", &raw)?,
        None => {
            warnings.push(ConfigWarning::UsingDefault { field: "REDIS_PORT", default: "6379".to_string() });
            6379
        }
    };

    let redis_password = env_var("REDIS_PASSWORD");

    let jwt_secret = env_var("JWT_SECRET").ok_or(ConfigError::MissingRequired("JWT_SECRET"))?;
    recipe_validate::validate_jwt_secret(&jwt_secret)
        .map_err(|_| ConfigError::Invalid { field: "JWT_SECRET", message: recipe_validate::MSG_JWT_SECRET_LEN.to_string() })?;

    let api_key = match env_var("API_KEY") {
        Some(raw) => {
            recipe_validate::validate_api_key(&raw)
                .map_err(|_| ConfigError::Invalid { field: "API_KEY", message: recipe_validate::MSG_API_KEY_LEN.to_string() })?;
            Some(raw)
        }
        None => None,
    };

    let rate_limit_window_ms = match env_var("RATE_LIMIT_WINDOW_MS") {
        Some(raw) => parse_or_invalid("RATE_LIMIT_WINDOW_MS", &raw)?,
        None => 900_000,
    };
    if rate_limit_window_ms > LARGE_RATE_LIMIT_WINDOW_MS {
        warnings.push(ConfigWarning::LargeRateLimitWindow { ms: rate_limit_window_ms });
    }

    let rate_limit_max_requests = match env_var("RATE_LIMIT_MAX_REQUESTS") {
        Some(raw) => parse_or_invalid("RATE_LIMIT_MAX_REQUESTS", &raw)?,
        None => 100,
    };

    let max_file_size_bytes = match env_var("MAX_FILE_SIZE_BYTES") {
        Some(raw) => parse_or_invalid("MAX_FILE_SIZE_BYTES", &raw)?,
        None => 10_485_760,
    };

    let max_request_size_bytes = match env_var("MAX_REQUEST_SIZE_BYTES") {
        Some(raw) => parse_or_invalid("MAX_REQUEST_SIZE_BYTES", &raw)?,
        None => 10_485_760,
    };

    Ok((
        AppConfig {
            port,
            ws_port,
            ws_host,
            database_url,
            redis_host,
            redis_port,
            redis_password,
            jwt_secret,
            api_key,
            rate_limit_window_ms,
            rate_limit_max_requests,
            max_file_size_bytes,
            max_request_size_bytes,
        },
        warnings,
    ))
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        for (k, v) in vars {
            unsafe { env::set_var(k, v) };
        }
        f();
        for (k, _) in vars {
            unsafe { env::remove_var(k) };
        }
    }

    #[test]
    fn missing_database_url_is_fatal() {
        with_env(&[("JWT_SECRET", &"a".repeat(32))], || {
            unsafe { env::remove_var("DATABASE_URL") };
            let err = load_config().unwrap_err();
            assert_eq!(err, ConfigError::MissingRequired("DATABASE_URL"));
        });
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        with_env(&[("DATABASE_URL", "memory://"), ("JWT_SECRET", "too-short")], || {
            let err = load_config().unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { field: "JWT_SECRET", .. }));
        });
    }

    #[test]
    fn defaults_applied_when_optional_vars_absent() {
        with_env(&[("DATABASE_URL", "memory://"), ("JWT_SECRET", &"a".repeat(32))], || {
            let (config, warnings) = load_config().unwrap();
            assert_eq!(config.port, 3000);
            assert_eq!(config.redis_host, "localhost");
            assert!(warnings.iter().any(|w| matches!(w, ConfigWarning::UsingDefault { field: "PORT", .. })));
        });
    }
}
