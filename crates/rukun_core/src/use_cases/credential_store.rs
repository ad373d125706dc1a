use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::entities::{Credentials, UserIdentity};
use crate::ports::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "auth_user";

/// Process-wide session credentials backed by a durable key-value store.
///
/// The in-memory snapshot is authoritative: `get()` never waits on storage,
/// and a failed write to storage is logged and otherwise ignored.
///
/// Every new session (`restore`, `set`, `clear`) advances the session epoch.
/// `rotate` only applies while the epoch it was given is still current, so a
/// refresh that finishes after a logout cannot bring the old session back.
pub struct CredentialStore<K>
where
    K: KeyValueStore,
{
    current: RwLock<Snapshot>,
    storage: Arc<K>,
    // Serializes persistence so storage ends up in the same order as memory
    write_lock: Mutex<()>,
}

#[derive(Default)]
struct Snapshot {
    epoch: u64,
    credentials: Credentials,
}

impl<K> CredentialStore<K>
where
    K: KeyValueStore,
{
    pub fn new(storage: Arc<K>) -> Self {
        Self {
            current: RwLock::new(Snapshot::default()),
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Current snapshot
    pub fn get(&self) -> Credentials {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .credentials
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .credentials
            .access_token
            .clone()
    }

    /// Current snapshot together with the session epoch it belongs to
    pub fn snapshot(&self) -> (u64, Credentials) {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        (current.epoch, current.credentials.clone())
    }

    pub fn epoch(&self) -> u64 {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .epoch
    }

    /// Load persisted credentials into memory (startup)
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Credentials {
        let _guard = self.write_lock.lock().await;

        let access_token = self.read_key(ACCESS_TOKEN_KEY).await;
        let refresh_token = self.read_key(REFRESH_TOKEN_KEY).await;
        let user = self.read_key(USER_KEY).await.and_then(|raw| {
            serde_json::from_str::<UserIdentity>(&raw)
                .map_err(|e| warn!(error = %e, "discarding unreadable stored user"))
                .ok()
        });

        let restored = Credentials {
            access_token,
            refresh_token,
            user,
        };
        debug!(
            authenticated = restored.is_authenticated(),
            "restored credentials from storage"
        );
        self.replace(restored.clone());
        restored
    }

    /// Start a new session: replace all three fields at once and persist them
    #[instrument(skip_all)]
    pub async fn set(&self, access_token: String, refresh_token: String, user: Option<UserIdentity>) {
        let _guard = self.write_lock.lock().await;

        let credentials = Credentials::new(access_token, refresh_token, user);
        self.replace(credentials.clone());
        self.persist(&credentials).await;
    }

    /// Swap in rotated tokens for the session identified by `epoch`.
    ///
    /// Returns false, writing nothing, when that session has since been
    /// cleared or replaced.
    #[instrument(skip(self, access_token, refresh_token, user))]
    pub async fn rotate(
        &self,
        epoch: u64,
        access_token: String,
        refresh_token: String,
        user: Option<UserIdentity>,
    ) -> bool {
        let _guard = self.write_lock.lock().await;

        let credentials = Credentials::new(access_token, refresh_token, user);
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if current.epoch != epoch {
                debug!(epoch, current = current.epoch, "session changed, dropping rotated tokens");
                return false;
            }
            current.credentials = credentials.clone();
        }
        self.persist(&credentials).await;
        true
    }

    /// Reset all fields to absent and remove the persisted copies
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;

        self.replace(Credentials::default());

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            self.remove_key(key).await;
        }
        debug!("credentials cleared");
    }

    fn replace(&self, credentials: Credentials) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.epoch += 1;
        current.credentials = credentials;
    }

    async fn persist(&self, credentials: &Credentials) {
        if let Some(token) = &credentials.access_token {
            self.write_key(ACCESS_TOKEN_KEY, token).await;
        }
        if let Some(token) = &credentials.refresh_token {
            self.write_key(REFRESH_TOKEN_KEY, token).await;
        }
        let user_json = credentials.user.as_ref().and_then(|u| {
            serde_json::to_string(u)
                .map_err(|e| warn!(error = %e, "failed to serialize user"))
                .ok()
        });
        match user_json {
            Some(json) => self.write_key(USER_KEY, &json).await,
            None => self.remove_key(USER_KEY).await,
        }
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read credential from storage");
                None
            }
        }
    }

    async fn write_key(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value).await {
            warn!(key, error = %e, "failed to persist credential");
        }
    }

    async fn remove_key(&self, key: &str) {
        if let Err(e) = self.storage.remove(key).await {
            warn!(key, error = %e, "failed to remove persisted credential");
        }
    }
}
