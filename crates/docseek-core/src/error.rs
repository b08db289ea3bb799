//! Error types for DocSeek.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// API key failed the local shape check; never reaches the network.
    #[error("Format error: {0}")]
    Format(String),

    /// File failed local type/size admission before upload.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation needs a valid credential and none is held.
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success response carrying the server's `detail` message.
    #[error("Backend error {status}: {detail}")]
    Backend { status: u16, detail: String },

    #[error("Confirmation declined")]
    ConfirmationDeclined,

    /// A second invocation while the same operation is in flight.
    #[error("Busy: {0} already in progress")]
    Busy(&'static str),

    /// The response belongs to a request that was invalidated.
    #[error("Superseded: response discarded")]
    Superseded,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Inline message shown at the component boundary.
    pub fn user_message(&self) -> String {
        match self {
            Self::Format(m)
            | Self::Validation(m)
            | Self::Credential(m)
            | Self::Transport(m)
            | Self::InvalidState(m)
            | Self::Config(m) => m.clone(),
            Self::Backend { detail, .. } => detail.clone(),
            Self::ConfirmationDeclined => "Action cancelled".into(),
            Self::Busy(op) => format!("Please wait, {} is still running", op),
            Self::Superseded => "Result discarded because the view was refreshed".into(),
            Self::Io(e) => e.to_string(),
            Self::Json(e) => e.to_string(),
        }
    }

    /// Whether the error came from an outbound call (as opposed to a local check).
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Backend { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
