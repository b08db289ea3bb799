//! Shares the credential, routes views and drives the refresh-epoch.
//!
//! A successful upload is the only cross-workflow coupling: it advances the
//! epoch, which discards registry and search state, and switches to Search.

use std::sync::Arc;

use docseek_api::{BackendClient, HealthStatus, KeyValidator, UploadSummary};
use docseek_core::{ClientConfig, Result};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::credential::{Credential, CredentialManager};
use crate::registry::DocumentRegistry;
use crate::search::SearchController;
use crate::session::SessionStorage;
use crate::upload::{SelectedFile, UploadCompleted, UploadController};

/// Top-level navigation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Upload,
    Search,
    Documents,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Search => write!(f, "search"),
            Self::Documents => write!(f, "documents"),
        }
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upload" => Ok(Self::Upload),
            "search" => Ok(Self::Search),
            "documents" | "docs" => Ok(Self::Documents),
            other => Err(format!("Unknown view: {}", other)),
        }
    }
}

pub struct Coordinator {
    backend: BackendClient,
    credentials: Arc<CredentialManager>,
    upload: UploadController,
    registry: DocumentRegistry,
    search: SearchController,
    view: RwLock<View>,
    epoch: watch::Sender<u64>,
    completed: Mutex<mpsc::UnboundedReceiver<UploadCompleted>>,
}

impl Coordinator {
    /// Build every workflow from configuration.
    pub fn new(config: &ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let backend = BackendClient::new(config)?;
        let validator = KeyValidator::new(config)?;
        Ok(Self::with_clients(backend, validator, storage))
    }

    pub fn with_clients(
        backend: BackendClient,
        validator: KeyValidator,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let credentials = Arc::new(CredentialManager::new(validator, storage));
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        let (epoch, _) = watch::channel(0);

        Self {
            upload: UploadController::new(backend.clone(), credentials.handle(), completed_tx),
            registry: DocumentRegistry::new(backend.clone()),
            search: SearchController::new(backend.clone(), credentials.handle()),
            backend,
            credentials,
            view: RwLock::new(View::default()),
            epoch,
            completed: Mutex::new(completed_rx),
        }
    }

    /// Restore the session credential. Returns the resulting credential.
    pub fn start(&self) -> Credential {
        let credential = self.credentials.initialize();
        info!(
            "Coordinator started: credential {}, view {}",
            credential.validity,
            self.view()
        );
        credential
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn uploads(&self) -> &UploadController {
        &self.upload
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn search(&self) -> &SearchController {
        &self.search
    }

    pub fn view(&self) -> View {
        *self.view.read()
    }

    pub fn epoch(&self) -> u64 {
        *self.epoch.borrow()
    }

    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> {
        self.epoch.subscribe()
    }

    /// Switch views. Entering Documents loads the registry if it is not loaded.
    pub async fn show(&self, view: View) -> Result<()> {
        *self.view.write() = view;
        debug!("View -> {}", view);
        if view == View::Documents && self.registry.needs_load() {
            self.registry.refresh().await?;
        }
        Ok(())
    }

    /// Upload a file and apply the completion signal.
    pub async fn upload(&self, file: SelectedFile) -> Result<UploadSummary> {
        let result = self.upload.submit(file).await;
        self.process_signals();
        result
    }

    /// Drain pending upload-completed signals. Returns how many were applied.
    pub fn process_signals(&self) -> usize {
        let mut applied = 0;
        let mut rx = self.completed.lock();
        while let Ok(signal) = rx.try_recv() {
            let epoch = self.advance_epoch();
            *self.view.write() = View::Search;
            info!(
                "Upload of {} completed, epoch now {}",
                signal.summary.filename, epoch
            );
            applied += 1;
        }
        applied
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.backend.health().await
    }

    fn advance_epoch(&self) -> u64 {
        self.epoch.send_modify(|e| *e += 1);
        let epoch = *self.epoch.borrow();
        self.registry.invalidate(epoch);
        self.search.invalidate(epoch);
        epoch
    }
}
