//! API key check against the vendor's model listing endpoint.

use docseek_core::{ApiKey, ClientConfig, Error, Result};
use reqwest::Client;
use tracing::{debug, warn};

/// Outcome of a key check that reached the validation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    Accepted,
    Rejected { status: u16 },
}

/// Validates API keys with `GET <validation_url>` and a bearer header.
#[derive(Clone)]
pub struct KeyValidator {
    http: Client,
    url: String,
}

impl KeyValidator {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, &config.validation_url))
    }

    pub fn with_client(http: Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }

    /// 2xx ⇒ `Accepted`, any other status ⇒ `Rejected`, no response ⇒ `Error::Transport`.
    pub async fn check(&self, key: &ApiKey) -> Result<KeyCheck> {
        debug!("Validating API key {} against {}", key, self.url);
        let resp = self
            .http
            .get(&self.url)
            .header("Authorization", format!("Bearer {}", key.expose()))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("Key validation request failed: {}", e);
                Error::Transport(
                    "Failed to validate API key. Please check your internet connection.".into(),
                )
            })?;

        if resp.status().is_success() {
            Ok(KeyCheck::Accepted)
        } else {
            debug!("Validation endpoint returned {}", resp.status());
            Ok(KeyCheck::Rejected {
                status: resp.status().as_u16(),
            })
        }
    }
}
