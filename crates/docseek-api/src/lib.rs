//! Backend REST contract for the document index service.
//!
//! Chunking, embedding and ranking happen server-side; this crate only
//! speaks the wire contract and the external API key check.

pub mod backend;
pub mod types;
pub mod validator;

pub use backend::{BackendClient, ProgressFn, UploadFile};
pub use types::*;
pub use validator::{KeyCheck, KeyValidator};
