//! Credential lifecycle: session load, remote validation, persistence and clear.
//!
//! `CredentialManager` is the only writer. Every other workflow reads the
//! credential through a [`CredentialHandle`] and may proceed only while the
//! validity is `Valid`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docseek_api::{KeyCheck, KeyValidator};
use docseek_core::{ApiKey, Error, Result, Validity, SESSION_KEY};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::gate::RequestGate;
use crate::session::SessionStorage;

const MISSING_KEY: &str = "OpenAI API key is required. Please set your API key first.";
const BAD_PREFIX: &str = "API key must start with \"sk-\"";
const REJECTED: &str = "Invalid API key. Please check your key and try again.";

/// Snapshot of the shared credential.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credential {
    pub key: Option<ApiKey>,
    pub validity: Validity,
    pub last_error: Option<String>,
}

impl Credential {
    /// The key, only when it is usable.
    pub fn valid_key(&self) -> Option<&ApiKey> {
        match self.validity {
            Validity::Valid => self.key.as_ref(),
            _ => None,
        }
    }
}

/// Read-only view of the credential handed to dependent workflows.
#[derive(Clone)]
pub struct CredentialHandle {
    rx: watch::Receiver<Credential>,
}

impl CredentialHandle {
    /// The valid key, or `Error::Credential` when none is held.
    pub fn require_valid(&self) -> Result<ApiKey> {
        self.rx
            .borrow()
            .valid_key()
            .cloned()
            .ok_or_else(|| Error::Credential(MISSING_KEY.into()))
    }

    /// Wait for the next change notification.
    pub async fn changed(&mut self) -> Option<Credential> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Owns the API key lifecycle: `Unset → Validating → {Valid, Invalid} → Unset`.
pub struct CredentialManager {
    validator: KeyValidator,
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<Credential>,
    prompt_open: AtomicBool,
    gate: RequestGate,
}

impl CredentialManager {
    pub fn new(validator: KeyValidator, storage: Arc<dyn SessionStorage>) -> Self {
        let (state, _) = watch::channel(Credential::default());
        Self {
            validator,
            storage,
            state,
            prompt_open: AtomicBool::new(false),
            gate: RequestGate::new("API key validation"),
        }
    }

    pub fn handle(&self) -> CredentialHandle {
        CredentialHandle {
            rx: self.state.subscribe(),
        }
    }

    pub fn current(&self) -> Credential {
        self.state.borrow().clone()
    }

    /// Whether the acquisition prompt should be shown.
    pub fn prompt_needed(&self) -> bool {
        self.prompt_open.load(Ordering::Acquire)
    }

    pub fn is_validating(&self) -> bool {
        self.gate.is_busy()
    }

    /// Load a persisted key from session storage. A stored key is trusted
    /// without re-validation; otherwise the prompt opens.
    pub fn initialize(&self) -> Credential {
        match self.storage.get(SESSION_KEY) {
            Some(raw) if !raw.is_empty() => {
                let key = ApiKey::new(raw);
                info!("Restored API key {} from session", key);
                self.publish(Credential {
                    key: Some(key),
                    validity: Validity::Valid,
                    last_error: None,
                });
                self.prompt_open.store(false, Ordering::Release);
            }
            _ => {
                debug!("No API key in session, opening prompt");
                self.prompt_open.store(true, Ordering::Release);
            }
        }
        self.current()
    }

    /// Check the key's shape locally, then against the validation endpoint.
    pub async fn validate(&self, token: &str) -> Result<()> {
        let key = ApiKey::new(token);
        if !key.has_expected_shape() {
            self.state.send_modify(|c| c.last_error = Some(BAD_PREFIX.into()));
            return Err(Error::Format(BAD_PREFIX.into()));
        }

        let ticket = self.gate.begin()?;
        self.publish(Credential {
            key: Some(key.clone()),
            validity: Validity::Validating,
            last_error: None,
        });

        let outcome = self.validator.check(&key).await;
        if !ticket.is_current() {
            debug!("Discarding validation of {} after the key was cleared", key);
            return Err(Error::Superseded);
        }

        match outcome {
            Ok(KeyCheck::Accepted) => {
                if let Err(e) = self.storage.set(SESSION_KEY, key.expose()) {
                    warn!("Failed to persist API key to session: {}", e);
                }
                info!("API key {} validated", key);
                self.publish(Credential {
                    key: Some(key),
                    validity: Validity::Valid,
                    last_error: None,
                });
                self.prompt_open.store(false, Ordering::Release);
                Ok(())
            }
            Ok(KeyCheck::Rejected { status }) => {
                info!("API key {} rejected with status {}", key, status);
                self.mark_invalid(key, REJECTED.into());
                Err(Error::Credential(REJECTED.into()))
            }
            Err(e) => {
                self.mark_invalid(key, e.user_message());
                Err(e)
            }
        }
    }

    /// Forget the key, purge it from storage and reopen the prompt.
    pub fn clear(&self) {
        self.gate.invalidate();
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            warn!("Failed to purge API key from session: {}", e);
        }
        self.publish(Credential::default());
        self.prompt_open.store(true, Ordering::Release);
        info!("API key cleared");
    }

    fn mark_invalid(&self, key: ApiKey, message: String) {
        self.publish(Credential {
            key: Some(key),
            validity: Validity::Invalid,
            last_error: Some(message),
        });
    }

    fn publish(&self, credential: Credential) {
        debug!("Credential -> {}", credential.validity);
        self.state.send_replace(credential);
    }
}
