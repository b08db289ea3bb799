//! Client-side workflows over the document index service.
//!
//! Four cooperating workflows (credential, upload, registry, search) and the
//! coordinator that shares the credential between them and drives the
//! refresh-epoch after a successful upload.

pub mod coordinator;
pub mod credential;
mod gate;
pub mod highlight;
pub mod registry;
pub mod search;
pub mod session;
pub mod upload;

pub use coordinator::{Coordinator, View};
pub use credential::{Credential, CredentialHandle, CredentialManager};
pub use highlight::{Highlighter, ScoreTier, Span};
pub use registry::{Confirm, DocumentRegistry, RegistryView};
pub use search::{RankedResult, SearchController, SearchParams, SearchView};
pub use session::{FileSession, MemorySession, SessionStorage};
pub use upload::{SelectedFile, UploadCompleted, UploadController, UploadJob, UploadStatus};
