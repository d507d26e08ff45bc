//! Configuration loading for the vecquery client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "VECQUERY_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Service root, e.g. `http://localhost:8080`.
    pub base_url: String,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    /// Extra headers sent with every request (e.g. vectorizer API keys).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or VECQUERY_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ClientConfig {
    /// Config for `base_url` with the given timeout and no auth.
    pub fn new(base_url: impl Into<String>, request_timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_ms,
            auth: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig {
            api_key: api_key.into(),
        });
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Load from `--config <path>` or `VECQUERY_CONFIG`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("base_url", "must start with http:// or https://"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if let Some(auth) = &self.auth {
            if auth.api_key.trim().is_empty() {
                return Err(invalid("auth.api_key", "must not be empty"));
            }
            HeaderValue::from_str(&format!("Bearer {}", auth.api_key))
                .map_err(|e| invalid("auth.api_key", e.to_string()))?;
        }
        for (name, value) in &self.headers {
            let field = format!("headers.{}", name);
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidValue {
                field: field.clone(),
                reason: e.to_string(),
            })?;
            HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidValue {
                field,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// `base_url` without trailing slashes.
    pub fn endpoint_root(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
