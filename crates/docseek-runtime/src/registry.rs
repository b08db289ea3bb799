//! Locally cached view of ingested documents, with confirmed delete.

use std::sync::atomic::{AtomicU64, Ordering};

use docseek_api::{BackendClient, Document};
use docseek_core::{Error, Result};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::gate::RequestGate;

/// Asks the user to confirm an irrevocable action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// What the registry shows right now.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryView {
    Loading,
    /// Fetch failed; the previous list is not shown. Retry with `refresh`.
    Error(String),
    Empty,
    Documents(Vec<Document>),
}

#[derive(Debug, Default)]
struct RegistryState {
    documents: Vec<Document>,
    loading: bool,
    loaded: bool,
    error: Option<String>,
    deleting: Option<String>,
}

/// Owns the document list; replaced wholesale on every fetch.
pub struct DocumentRegistry {
    backend: BackendClient,
    state: RwLock<RegistryState>,
    epoch: AtomicU64,
    refresh_gate: RequestGate,
    delete_gate: RequestGate,
}

impl DocumentRegistry {
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            state: RwLock::new(RegistryState::default()),
            epoch: AtomicU64::new(0),
            refresh_gate: RequestGate::new("document refresh"),
            delete_gate: RequestGate::new("document delete"),
        }
    }

    // ---------------------------------------------------------------
    // Fetch
    // ---------------------------------------------------------------

    /// Fetch the full list and replace local state.
    pub async fn refresh(&self) -> Result<Vec<Document>> {
        let ticket = self.refresh_gate.begin()?;
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        let result = self.backend.list_documents().await;
        if !ticket.is_current() {
            debug!("Discarding document list from a previous epoch");
            return Err(Error::Superseded);
        }

        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(documents) => {
                info!("Loaded {} documents", documents.len());
                state.documents = documents.clone();
                state.loaded = true;
                Ok(documents)
            }
            Err(e) => {
                warn!("Failed to load documents: {}", e);
                state.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Whether the registry has never loaded since the last invalidation.
    pub fn needs_load(&self) -> bool {
        let state = self.state.read();
        !state.loaded && !state.loading && state.error.is_none()
    }

    // ---------------------------------------------------------------
    // Delete
    // ---------------------------------------------------------------

    /// Delete after confirmation. Local state changes only on server success.
    pub async fn delete(&self, file_id: &str, confirm: &dyn Confirm) -> Result<()> {
        let ticket = self.delete_gate.begin()?;

        let filename = self
            .state
            .read()
            .documents
            .iter()
            .find(|d| d.file_id == file_id)
            .map(|d| d.filename.clone())
            .unwrap_or_else(|| file_id.to_string());
        let prompt = format!(
            "Are you sure you want to delete \"{}\"? This action cannot be undone.",
            filename
        );
        if !confirm.confirm(&prompt) {
            debug!("Delete of {} declined", file_id);
            return Err(Error::ConfirmationDeclined);
        }

        self.state.write().deleting = Some(file_id.to_string());
        let result = self.backend.delete_document(file_id).await;
        if !ticket.is_current() {
            return Err(Error::Superseded);
        }

        let mut state = self.state.write();
        state.deleting = None;
        match result {
            Ok(()) => {
                state.documents.retain(|d| d.file_id != file_id);
                info!("Deleted {} ({})", filename, file_id);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", file_id, e);
                Err(e)
            }
        }
    }

    /// File id whose delete is in flight.
    pub fn deleting(&self) -> Option<String> {
        self.state.read().deleting.clone()
    }

    // ---------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------

    pub fn view(&self) -> RegistryView {
        let state = self.state.read();
        if state.loading {
            RegistryView::Loading
        } else if let Some(err) = &state.error {
            RegistryView::Error(err.clone())
        } else if state.documents.is_empty() {
            RegistryView::Empty
        } else {
            RegistryView::Documents(state.documents.clone())
        }
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state.read().documents.clone()
    }

    /// Sum of `chunks_count` over the documents currently held.
    pub fn total_chunks(&self) -> u64 {
        self.state.read().documents.iter().map(|d| d.chunks_count).sum()
    }

    /// `1 Document` / `N Documents`.
    pub fn count_label(&self) -> String {
        let n = self.state.read().documents.len();
        format!("{} Document{}", n, if n == 1 { "" } else { "s" })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Discard all state for a new refresh-epoch; in-flight responses become stale.
    pub fn invalidate(&self, epoch: u64) {
        self.refresh_gate.invalidate();
        self.delete_gate.invalidate();
        *self.state.write() = RegistryState::default();
        self.epoch.store(epoch, Ordering::Release);
        debug!("Document registry invalidated at epoch {}", epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseek_core::ClientConfig;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry(server: &MockServer) -> DocumentRegistry {
        DocumentRegistry::new(BackendClient::new(&ClientConfig::with_base_url(server.uri())).unwrap())
    }

    fn docs_json() -> serde_json::Value {
        serde_json::json!([
            {"file_id": "a", "filename": "alpha.pdf", "chunks_count": 5, "status": "processed", "upload_date": "2025-01-01T10:00:00"},
            {"file_id": "b", "filename": "beta.txt", "chunks_count": 2, "status": "processed", "upload_date": "2025-01-02T10:00:00"},
            {"file_id": "c", "filename": "gamma.docx", "chunks_count": 0, "status": "failed", "upload_date": "2025-01-03T10:00:00"}
        ])
    }

    async fn mount_list(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/documents/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(docs_json()))
            .mount(server)
            .await;
    }

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    #[tokio::test]
    async fn test_refresh_and_total_chunks() {
        let server = MockServer::start().await;
        mount_list(&server).await;
        let reg = registry(&server);
        assert!(reg.needs_load());

        let docs = reg.refresh().await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(reg.total_chunks(), 7);
        assert_eq!(reg.count_label(), "3 Documents");
        assert!(!reg.needs_load());
        assert!(matches!(reg.view(), RegistryView::Documents(d) if d.len() == 3));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let server = MockServer::start().await;
        mount_list(&server).await;
        let reg = registry(&server);

        let first = reg.refresh().await.unwrap();
        let second = reg.refresh().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.documents(), second);
    }

    #[tokio::test]
    async fn test_refresh_failure_hides_list() {
        let server = MockServer::start().await;
        mount_list(&server).await;
        let reg = registry(&server);
        reg.refresh().await.unwrap();

        server.reset().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"detail": "Redis connection failed"})),
            )
            .mount(&server)
            .await;

        assert!(reg.refresh().await.is_err());
        assert_eq!(
            reg.view(),
            RegistryView::Error("Redis connection failed".into())
        );

        // Manual retry recovers.
        server.reset().await;
        mount_list(&server).await;
        reg.refresh().await.unwrap();
        assert!(matches!(reg.view(), RegistryView::Documents(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let server = MockServer::start().await;
        mount_list(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/api/documents/b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "Document deleted successfully"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&server);
        reg.refresh().await.unwrap();
        reg.delete("b", &yes).await.unwrap();

        let docs = reg.documents();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.file_id != "b"));
        assert_eq!(reg.total_chunks(), 5);
        assert!(reg.deleting().is_none());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_state() {
        let server = MockServer::start().await;
        mount_list(&server).await;
        Mock::given(method("DELETE"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"detail": "404: Document not found"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&server);
        reg.refresh().await.unwrap();
        let before = reg.documents();

        let err = reg.delete("zzz", &yes).await.unwrap_err();
        assert_eq!(err.user_message(), "404: Document not found");
        assert_eq!(reg.documents(), before);
    }

    #[tokio::test]
    async fn test_declined_delete_issues_no_request() {
        let server = MockServer::start().await;
        mount_list(&server).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let reg = registry(&server);
        reg.refresh().await.unwrap();

        let asked = std::cell::RefCell::new(String::new());
        let confirm = |prompt: &str| {
            *asked.borrow_mut() = prompt.to_string();
            false
        };
        let err = reg.delete("a", &confirm).await.unwrap_err();
        assert!(matches!(err, Error::ConfirmationDeclined));
        assert!(asked.borrow().contains("\"alpha.pdf\""));
        assert!(asked.borrow().contains("cannot be undone"));
        assert_eq!(reg.documents().len(), 3);

        assert!(matches!(reg.delete("b", &no).await, Err(Error::ConfirmationDeclined)));
    }

    #[tokio::test]
    async fn test_invalidate_discards_in_flight_refresh() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(docs_json())
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let reg = registry(&server);
        let (stale, _) = tokio::join!(reg.refresh(), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            reg.invalidate(1);
        });

        assert!(matches!(stale, Err(Error::Superseded)));
        assert!(reg.documents().is_empty());
        assert!(reg.needs_load());
        assert_eq!(reg.epoch(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(docs_json())
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&server);
        let (first, second) = tokio::join!(reg.refresh(), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            reg.refresh().await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Busy(_))));
    }
}
