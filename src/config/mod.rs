use anyhow::anyhow;
use anyhow::Result;
use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone, Deserialize)]
pub struct GeminiConfig {
    /// Google AI Studio key. Sent as a query parameter, never logged.
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model_name: String,

    /// Per-attempt HTTP timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts per analysis, first one included
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub server: ServerConfig,
    pub log_level: log::LevelFilter,
    pub environment: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What the health endpoint reports about the running configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub environment: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from environment variables (dotenv recommended)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let api_key =
            env::var("GEMINI_API_KEY").map_err(|_| anyhow!("Missing GEMINI_API_KEY"))?;

        let gemini = GeminiConfig {
            api_key,
            model_name: env::var("GEMINI_MODEL").unwrap_or_else(|_| default_model()),
            timeout_secs: env_or("GEMINI_TIMEOUT", default_timeout()),
            max_retries: env_or("GEMINI_MAX_RETRIES", default_max_retries()),
            api_base: env::var("GEMINI_API_BASE").unwrap_or_else(|_| default_api_base()),
        };

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PORT", 3000),
        };

        Ok(Config {
            gemini,
            server,
            log_level: env_or("LOG_LEVEL", log::LevelFilter::Info),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        })
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut report = ConfigValidation::default();

        if self.gemini.api_key.trim().is_empty() {
            report.errors.push("GEMINI_API_KEY is required".into());
        }
        if self.gemini.max_retries == 0 {
            report.errors.push("GEMINI_MAX_RETRIES must be at least 1".into());
        }
        if self.server.port == 0 {
            report.errors.push("PORT must be between 1 and 65535".into());
        }

        if !(1..=300).contains(&self.gemini.timeout_secs) {
            report
                .warnings
                .push("GEMINI_TIMEOUT should be between 1 and 300 seconds".into());
        }
        if !(1..=10).contains(&self.gemini.max_retries) {
            report
                .warnings
                .push("GEMINI_MAX_RETRIES should be between 1 and 10".into());
        }

        report
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            environment: self.environment.clone(),
            model: self.gemini.model_name.clone(),
            timeout_secs: self.gemini.timeout_secs,
            max_retries: self.gemini.max_retries,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        gemini: GeminiConfig {
            api_key: "secret-key".into(),
            model_name: default_model(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            api_base: default_api_base(),
        },
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 3000,
        },
        log_level: log::LevelFilter::Info,
        environment: "test".into(),
    }
}
