use async_trait::async_trait;
use keyring::Entry;
use rukun_core::ports::KeyValueStore;
use rukun_core::Error;
use tracing::instrument;

const SERVICE_NAME: &str = "rukun";

/// Key-value store on top of the OS secret service (libsecret on Linux)
pub struct KeyringKeyValueStore {
    service: String,
}

impl KeyringKeyValueStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Separate keyring namespace, e.g. one per API environment
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn get_entry(&self, key: &str) -> Result<Entry, Error> {
        Entry::new(&self.service, key)
            .map_err(|e| Error::CredentialStorage(format!("failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for KeyringKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entry = self.get_entry(key)?;

        tokio::task::spawn_blocking(move || match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::CredentialStorage(format!(
                "failed to read keyring entry: {}",
                e
            ))),
        })
        .await
        .map_err(|e| Error::CredentialStorage(format!("task join error: {}", e)))?
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let entry = self.get_entry(key)?;

        // Keyring calls block on D-Bus
        let value = value.to_string();
        tokio::task::spawn_blocking(move || {
            entry
                .set_password(&value)
                .map_err(|e| Error::CredentialStorage(format!("failed to write keyring entry: {}", e)))
        })
        .await
        .map_err(|e| Error::CredentialStorage(format!("task join error: {}", e)))?
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<(), Error> {
        let entry = self.get_entry(key)?;

        tokio::task::spawn_blocking(move || match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::CredentialStorage(format!(
                "failed to delete keyring entry: {}",
                e
            ))),
        })
        .await
        .map_err(|e| Error::CredentialStorage(format!("task join error: {}", e)))?
    }
}
