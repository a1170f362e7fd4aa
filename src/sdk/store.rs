//! Durable storage for encoded SDK registries, one blob per namespace

use crate::types::SdkError;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{process, thread};
use tracing::debug;

pub trait SdkStore: Send + Sync {
    /// Returns `None` if nothing has been saved for `namespace` yet.
    fn load(&self, namespace: &str) -> Result<Option<String>, SdkError>;

    fn save(&self, namespace: &str, blob: &str) -> Result<(), SdkError>;
}

/// Stores each namespace as `<root>/<namespace>/sdks.xml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace).join("sdks.xml")
    }
}

impl SdkStore for FileStore {
    fn load(&self, namespace: &str) -> Result<Option<String>, SdkError> {
        let path = self.path_for(namespace);
        if !path.exists() {
            debug!("No SDK registry at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        Ok(Some(content))
    }

    fn save(&self, namespace: &str, blob: &str) -> Result<(), SdkError> {
        let path = self.path_for(namespace);
        write_atomically(&path, blob.as_bytes())?;
        debug!("Saved SDK registry to {}", path.display());
        Ok(())
    }
}

/// Write to a sibling temp file, flush it to disk, then rename over `path`.
fn write_atomically(path: &Path, data: &[u8]) -> Result<(), SdkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // One temp file per writing thread, so concurrent saves never share one
    let temp_path = path.with_extension(format!("xml.{}.{:x}.tmp", process::id(), thread_tag()));

    let written = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(SdkError::Io(e));
    }

    Ok(())
}

fn thread_tag() -> u64 {
    let mut hasher = DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// In-process store, mainly for tests and embedders without a data directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
    fail_saves: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(namespace: &str, blob: impl Into<String>) -> Self {
        let store = Self::new();
        store.blobs_mut().insert(namespace.to_string(), blob.into());
        store
    }

    /// Make every following `save` fail with an IO error.
    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn blob(&self, namespace: &str) -> Option<String> {
        self.blobs_mut().get(namespace).cloned()
    }

    fn blobs_mut(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SdkStore for MemoryStore {
    fn load(&self, namespace: &str) -> Result<Option<String>, SdkError> {
        Ok(self.blob(namespace))
    }

    fn save(&self, namespace: &str, blob: &str) -> Result<(), SdkError> {
        if *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(SdkError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "store is read-only",
            )));
        }
        self.blobs_mut().insert(namespace.to_string(), blob.to_string());
        Ok(())
    }
}
