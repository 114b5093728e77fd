use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PasteError, PasteResult};

/// Top-level client configuration (loaded from zkpaste.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasteConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub retry: RetryConfig,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Backend base URL (default: http://localhost:8080)
    pub base_url: String,
    /// API path prefix (default: /api/v1)
    pub api_prefix: String,
    /// Origin used in share URLs (defaults to base_url)
    pub share_origin: Option<String>,
    /// Path used in share URLs (default: /)
    pub share_path: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum serialized upload body (default: 1.5 MiB)
    pub max_payload_bytes: usize,
    /// Paste lifetime when none is given; 0 = never expires (default: 1 day)
    pub default_ttl_secs: u64,
}

/// Backoff policy for transient (429/5xx) fetch failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PasteConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limits: LimitsConfig::default(),
            retry: RetryConfig::default(),
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_prefix: "/api/v1".into(),
            share_origin: None,
            share_path: "/".into(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1024 * 1024 + 512 * 1024,
            default_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
        }
    }
}

impl PasteConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> PasteResult<Self> {
        toml::from_str(s).map_err(|e| PasteError::Config(format!("parsing config: {e}")))
    }

    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> PasteResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

impl ServerConfig {
    /// Absolute URL for an API route such as `/paste/{id}`.
    pub fn api_url(&self, route: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/'),
            route
        )
    }

    pub fn share_origin(&self) -> &str {
        self.share_origin
            .as_deref()
            .unwrap_or(&self.base_url)
            .trim_end_matches('/')
    }
}
