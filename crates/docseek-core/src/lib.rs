//! DocSeek core types: errors, client configuration and shared values.

pub mod admission;
pub mod config;
pub mod credential;
pub mod error;

pub use admission::{FileKind, ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES};
pub use config::ClientConfig;
pub use credential::{ApiKey, Validity, API_KEY_PREFIX, SESSION_KEY};
pub use error::{Error, Result};
