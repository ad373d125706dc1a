use std::path::PathBuf;

use async_trait::async_trait;
use rukun_core::config::{StorageBackend, StorageSettings};
use rukun_core::ports::KeyValueStore;
use rukun_core::Error;
use tracing::info;

use crate::configuration::project_dirs;
use crate::credentials::KeyringKeyValueStore;
use crate::file_store::FileKeyValueStore;
use crate::memory::MemoryKeyValueStore;

/// Credential storage selected at runtime from `storage.backend`
pub enum SessionStorage {
    Keyring(KeyringKeyValueStore),
    File(FileKeyValueStore),
    Memory(MemoryKeyValueStore),
}

impl SessionStorage {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        let storage = match settings.backend {
            StorageBackend::Keyring => Self::Keyring(KeyringKeyValueStore::new()),
            StorageBackend::Memory => Self::Memory(MemoryKeyValueStore::new()),
            StorageBackend::File => match &settings.path {
                Some(path) => Self::File(FileKeyValueStore::at(path.clone())),
                None => Self::File(FileKeyValueStore::new(default_data_dir())),
            },
        };
        info!(backend = storage.name(), "credential storage selected");
        storage
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyring(_) => "keyring",
            Self::File(_) => "file",
            Self::Memory(_) => "memory",
        }
    }
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[async_trait]
impl KeyValueStore for SessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match self {
            Self::Keyring(store) => store.get(key).await,
            Self::File(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        match self {
            Self::Keyring(store) => store.set(key, value).await,
            Self::File(store) => store.set(key, value).await,
            Self::Memory(store) => store.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        match self {
            Self::Keyring(store) => store.remove(key).await,
            Self::File(store) => store.remove(key).await,
            Self::Memory(store) => store.remove(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case(StorageBackend::Keyring, "keyring")]
    #[case(StorageBackend::File, "file")]
    #[case(StorageBackend::Memory, "memory")]
    fn test_backend_selection(#[case] backend: StorageBackend, #[case] expected: &str) {
        let storage = SessionStorage::from_settings(&StorageSettings {
            backend,
            path: None,
        });
        assert_eq!(storage.name(), expected);
    }

    #[tokio::test]
    async fn test_file_backend_uses_configured_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.json");
        let storage = SessionStorage::from_settings(&StorageSettings {
            backend: StorageBackend::File,
            path: Some(path.clone()),
        });

        storage.set("access_token", "A1").await.unwrap();

        assert!(path.exists());
        assert_eq!(storage.get("access_token").await.unwrap().as_deref(), Some("A1"));
    }
}
