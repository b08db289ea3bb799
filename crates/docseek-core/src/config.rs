//! Client configuration from environment and defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_VALIDATION_URL: &str = "https://api.openai.com/v1/models";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Top-level DocSeek client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash (e.g. `http://localhost:8000`).
    pub api_base_url: String,
    /// Credential validation endpoint.
    pub validation_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// File holding the session-scoped credential.
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            validation_url: DEFAULT_VALIDATION_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_file: default_session_file(),
        }
    }
}

fn default_session_file() -> PathBuf {
    std::env::temp_dir().join("docseek-session.json")
}

impl ClientConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DOCSEEK_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = std::env::var("DOCSEEK_VALIDATION_URL") {
            config.validation_url = url;
        }
        if let Ok(secs) = std::env::var("DOCSEEK_TIMEOUT_SECS") {
            config.timeout_secs = secs.parse().map_err(|_| {
                Error::Config(format!("DOCSEEK_TIMEOUT_SECS must be an integer, got {:?}", secs))
            })?;
        }
        if let Ok(path) = std::env::var("DOCSEEK_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Config pointing at a specific backend, other fields defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("DOCSEEK_API_BASE_URL", &self.api_base_url),
            ("DOCSEEK_VALIDATION_URL", &self.validation_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("{} must be an http(s) URL, got {:?}", name, url)));
            }
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("DOCSEEK_TIMEOUT_SECS must be greater than zero".into()));
        }
        Ok(())
    }
}
