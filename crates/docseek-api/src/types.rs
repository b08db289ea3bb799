//! Wire types matching the backend's JSON responses.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-reported processing status of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Processed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An entry of `GET /api/documents/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub filename: String,
    pub chunks_count: u64,
    pub status: DocumentStatus,
    pub upload_date: String,
}

impl Document {
    /// Parse `upload_date`, accepting RFC 3339 or a naive ISO timestamp (taken as UTC).
    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.upload_date)
    }

    /// Display form such as `Jan 5, 2025, 03:04 PM`; falls back to the raw value.
    pub fn formatted_upload_date(&self) -> String {
        match self.uploaded_at() {
            Some(ts) => ts.format("%b %-d, %Y, %I:%M %p").to_string(),
            None => self.upload_date.clone(),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// 2xx payload of `POST /api/documents/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub file_id: String,
    pub filename: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub chunks_created: u64,
    #[serde(default)]
    pub message: String,
}

/// One ranked chunk returned by the search endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    #[serde(default)]
    pub file_id: String,
    pub filename: String,
    pub chunk_index: u32,
    pub content: String,
    pub similarity_score: f64,
}

impl SearchHit {
    /// 1-based label, e.g. `Chunk 3`.
    pub fn chunk_label(&self) -> String {
        format!("Chunk {}", self.chunk_index + 1)
    }

    /// Percentage label, e.g. `92.0% match`.
    pub fn match_label(&self) -> String {
        format!("{:.1}% match", self.similarity_score * 100.0)
    }
}

/// JSON body of `POST /api/search/` (search restricted to given files).
#[derive(Debug, Clone, Serialize)]
pub struct ScopedSearchRequest<'a> {
    pub query: &'a str,
    pub openai_api_key: &'a str,
    pub limit: u32,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_ids: Option<&'a [String]>,
}

/// `GET /api/health` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub redis: String,
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Error body: `{"detail": ...}`. Validation failures carry a list instead of a string.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Null => None,
            serde_json::Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if msgs.is_empty() {
                    Some(self.detail.to_string())
                } else {
                    Some(msgs.join("; "))
                }
            }
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_deserialize() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "file_id": "f-1",
            "filename": "report.pdf",
            "chunks_count": 12,
            "status": "processed",
            "upload_date": "2025-01-05T15:04:00.123456",
        }))
        .unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.chunks_count, 12);
        assert_eq!(doc.formatted_upload_date(), "Jan 5, 2025, 03:04 PM");
    }

    #[test]
    fn test_unknown_status_and_bad_date() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "file_id": "f-2",
            "filename": "notes.txt",
            "chunks_count": 0,
            "status": "queued",
            "upload_date": "yesterday",
        }))
        .unwrap();
        assert_eq!(doc.status, DocumentStatus::Unknown);
        assert!(doc.uploaded_at().is_none());
        assert_eq!(doc.formatted_upload_date(), "yesterday");
    }

    #[test]
    fn test_rfc3339_date() {
        let doc = Document {
            file_id: "f".into(),
            filename: "a.txt".into(),
            chunks_count: 1,
            status: DocumentStatus::Processing,
            upload_date: "2025-03-10T08:30:00+02:00".into(),
        };
        assert_eq!(doc.formatted_upload_date(), "Mar 10, 2025, 06:30 AM");
    }

    #[test]
    fn test_hit_labels() {
        let hit = SearchHit {
            chunk_id: "f_2".into(),
            file_id: "f".into(),
            filename: "a.pdf".into(),
            chunk_index: 2,
            content: "text".into(),
            similarity_score: 0.92,
        };
        assert_eq!(hit.chunk_label(), "Chunk 3");
        assert_eq!(hit.match_label(), "92.0% match");
    }

    #[test]
    fn test_error_body_variants() {
        let s: ErrorBody = serde_json::from_str(r#"{"detail":"Document not found"}"#).unwrap();
        assert_eq!(s.message().as_deref(), Some("Document not found"));

        let list: ErrorBody = serde_json::from_str(
            r#"{"detail":[{"loc":["query","limit"],"msg":"ensure this value is less than or equal to 50"}]}"#,
        )
        .unwrap();
        assert_eq!(
            list.message().as_deref(),
            Some("ensure this value is less than or equal to 50")
        );

        let empty: ErrorBody = serde_json::from_str(r#"{"detail":null}"#).unwrap();
        assert!(empty.message().is_none());
    }

    #[test]
    fn test_scoped_request_omits_missing_files() {
        let req = ScopedSearchRequest {
            query: "q",
            openai_api_key: "sk-x",
            limit: 5,
            threshold: 0.5,
            file_ids: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("file_ids").is_none());
        assert_eq!(json["limit"], 5);
    }
}
