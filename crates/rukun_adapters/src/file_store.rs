use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rukun_core::ports::KeyValueStore;
use rukun_core::Error;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

pub const SESSION_FILE_NAME: &str = "session.json";

/// Key-value store backed by a single JSON object on disk
pub struct FileKeyValueStore {
    store_path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self::at(data_dir.join(SESSION_FILE_NAME))
    }

    pub fn at(store_path: PathBuf) -> Self {
        Self {
            store_path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, Error> {
        if !fs::try_exists(&self.store_path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.store_path).await?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| Error::CredentialStorage(format!("failed to parse session file: {}", e)))
    }

    /// Replace the session file in one rename. The content is written to an
    /// owner-only temporary file in the same directory first, so readers see
    /// either the old document or the new one.
    async fn save(&self, values: &BTreeMap<String, String>) -> Result<(), Error> {
        let parent = match self.store_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await?;

        let content = serde_json::to_string_pretty(values).map_err(|e| {
            Error::CredentialStorage(format!("failed to serialize session file: {}", e))
        })?;

        let target = self.store_path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let mut file = NamedTempFile::new_in(&parent)?;
            file.write_all(content.as_bytes())?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| Error::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::CredentialStorage(format!("task join error: {}", e)))?
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());

        debug!(path = %self.store_path.display(), "writing session file");
        self.save(&values).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.save(&values).await
    }
}
