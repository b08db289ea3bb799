//! Single-file upload: admission, transfer with progress, terminal states.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docseek_api::{BackendClient, ProgressFn, UploadFile, UploadSummary};
use docseek_core::admission::admit;
use docseek_core::{Error, FileKind, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::credential::CredentialHandle;
use crate::gate::RequestGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Uploading => write!(f, "uploading"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Name, size and MIME type of the selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A file chosen by the user, not yet read.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    info: FileInfo,
    source: FileSource,
}

impl SelectedFile {
    /// Describe a file on disk from its metadata.
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(Error::Validation(format!("{} is not a file", path.display())));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            info: FileInfo {
                mime_type: guess_mime(&name),
                name,
                size: meta.len(),
            },
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            info: FileInfo {
                mime_type: guess_mime(&name),
                size: bytes.len() as u64,
                name,
            },
            source: FileSource::Memory(bytes),
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => Ok(tokio::fs::read(path).await?),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

fn guess_mime(name: &str) -> String {
    FileKind::from_name(name)
        .map(|k| k.mime_type())
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Observable state of the upload workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadJob {
    pub file: Option<FileInfo>,
    pub status: UploadStatus,
    /// 0–100, non-decreasing while uploading.
    pub progress: u8,
    pub error: Option<String>,
}

/// Signal sent to the coordinator after a successful upload.
#[derive(Debug, Clone)]
pub struct UploadCompleted {
    pub summary: UploadSummary,
}

/// Drives one file at a time through `idle → uploading → success | error`.
pub struct UploadController {
    backend: BackendClient,
    credential: CredentialHandle,
    job: Arc<watch::Sender<UploadJob>>,
    selected: Mutex<Option<SelectedFile>>,
    completed: mpsc::UnboundedSender<UploadCompleted>,
    gate: RequestGate,
}

impl UploadController {
    pub fn new(
        backend: BackendClient,
        credential: CredentialHandle,
        completed: mpsc::UnboundedSender<UploadCompleted>,
    ) -> Self {
        let (job, _) = watch::channel(UploadJob::default());
        Self {
            backend,
            credential,
            job: Arc::new(job),
            selected: Mutex::new(None),
            completed,
            gate: RequestGate::new("upload"),
        }
    }

    pub fn job(&self) -> UploadJob {
        self.job.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadJob> {
        self.job.subscribe()
    }

    /// Admit a file for upload. Only allowed while idle; no network call is made.
    pub fn select_file(&self, file: SelectedFile) -> Result<()> {
        self.ensure_idle()?;
        self.job.send_modify(|j| j.error = None);

        let info = file.info().clone();
        if let Err(e) = admit(&info.name, info.size).and_then(|_| self.credential.require_valid()) {
            debug!("Rejected {}: {}", info.name, e);
            self.job.send_modify(|j| j.error = Some(e.user_message()));
            return Err(e);
        }

        debug!("Selected {} ({} bytes, {})", info.name, info.size, info.mime_type);
        *self.selected.lock() = Some(file);
        self.job.send_replace(UploadJob {
            file: Some(info),
            ..UploadJob::default()
        });
        Ok(())
    }

    /// Transfer the selected file. On success the coordinator is signalled.
    pub async fn upload(&self) -> Result<UploadSummary> {
        let ticket = self.gate.begin()?;
        self.ensure_idle()?;

        let file = self
            .selected
            .lock()
            .clone()
            .ok_or_else(|| Error::InvalidState("No file selected".into()))?;
        let key = match self.credential.require_valid() {
            Ok(key) => key,
            Err(e) => {
                self.job.send_modify(|j| j.error = Some(e.user_message()));
                return Err(e);
            }
        };
        admit(&file.info.name, file.info.size)?;

        self.job.send_modify(|j| {
            j.status = UploadStatus::Uploading;
            j.progress = 0;
            j.error = None;
        });

        // The file may have changed on disk since it was selected
        let read = file.read().await.and_then(|bytes| {
            admit(&file.info.name, bytes.len() as u64).map(|kind| (kind, bytes))
        });
        let result = match read {
            Ok((kind, bytes)) => {
                let upload = UploadFile {
                    name: file.info.name.clone(),
                    kind,
                    bytes,
                };
                self.backend.upload(upload, &key, self.progress_sink()).await
            }
            Err(e) => Err(e),
        };
        drop(ticket);

        match result {
            Ok(summary) => {
                info!(
                    "Uploaded {} as {} ({} chunks)",
                    summary.filename, summary.file_id, summary.chunks_created
                );
                self.job.send_modify(|j| {
                    j.status = UploadStatus::Success;
                    j.progress = 100;
                });
                if self
                    .completed
                    .send(UploadCompleted {
                        summary: summary.clone(),
                    })
                    .is_err()
                {
                    warn!("Upload completed but nobody is listening");
                }
                Ok(summary)
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", file.info.name, e);
                self.job.send_modify(|j| {
                    j.status = UploadStatus::Error;
                    j.error = Some(e.user_message());
                });
                Err(e)
            }
        }
    }

    /// Select and upload in one step, as a drop does.
    pub async fn submit(&self, file: SelectedFile) -> Result<UploadSummary> {
        self.select_file(file)?;
        self.upload().await
    }

    /// Back to `idle` from `success` or `error`, clearing file, error and progress.
    pub fn reset(&self) -> Result<()> {
        match self.job.borrow().status {
            UploadStatus::Success | UploadStatus::Error => {}
            UploadStatus::Uploading => return Err(Error::Busy("upload")),
            UploadStatus::Idle => {
                return Err(Error::InvalidState("Nothing to reset".into()));
            }
        }
        *self.selected.lock() = None;
        self.job.send_replace(UploadJob::default());
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.job.borrow().status {
            UploadStatus::Idle => Ok(()),
            UploadStatus::Uploading => Err(Error::Busy("upload")),
            UploadStatus::Success | UploadStatus::Error => Err(Error::InvalidState(
                "Reset the previous upload before selecting another file".into(),
            )),
        }
    }

    fn progress_sink(&self) -> ProgressFn {
        let job = self.job.clone();
        Arc::new(move |sent, total| {
            if total == 0 {
                return;
            }
            let pct = ((sent * 100 + total / 2) / total).min(100) as u8;
            job.send_if_modified(|j| {
                if j.status == UploadStatus::Uploading && pct > j.progress {
                    j.progress = pct;
                    true
                } else {
                    false
                }
            });
        })
    }
}
