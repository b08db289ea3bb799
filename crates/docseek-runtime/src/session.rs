//! Session-scoped key/value storage for the credential.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use docseek_core::Result;
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Storage that lives for one user session.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process storage; dropped with the process.
#[derive(Default)]
pub struct MemorySession {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Storage backed by one JSON file, deleted by [`FileSession::end`].
pub struct FileSession {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileSession {
    /// Open the session file, starting empty if it is missing or unreadable.
    pub fn open(path: &Path) -> Self {
        let entries: HashMap<String, String> = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        debug!("Session file {}: {} entries", path.display(), entries.len());
        Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// End the session: forget every entry and delete the file.
    pub fn end(&self) {
        self.entries.write().clear();
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove session file {}: {}", self.path.display(), e);
            }
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SessionStorage for FileSession {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
