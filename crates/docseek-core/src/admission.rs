//! Client-side admission rules for uploads.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum upload size: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "docx"];

/// The document types the backend can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Txt,
    Docx,
}

impl FileKind {
    const ALL: [Self; 3] = [Self::Pdf, Self::Txt, Self::Docx];

    /// Classify a file name by its extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.extension() == ext)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Txt => "text/plain",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Docx => "docx",
        }
    }
}

/// Check name and size against the admission rules.
pub fn admit(name: &str, size: u64) -> Result<FileKind> {
    let kind = FileKind::from_name(name).ok_or_else(|| {
        let supported: Vec<String> = ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| ext.to_ascii_uppercase())
            .collect();
        Error::Validation(format!(
            "File type not supported: {}. Supported types: {}",
            name,
            supported.join(", ")
        ))
    })?;
    if size > MAX_UPLOAD_BYTES {
        return Err(Error::Validation(format!(
            "File is too large ({:.1} MB). Maximum size is 10 MB",
            size as f64 / (1024.0 * 1024.0)
        )));
    }
    Ok(kind)
}
