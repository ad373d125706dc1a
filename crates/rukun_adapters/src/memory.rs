use std::collections::HashMap;

use async_trait::async_trait;
use rukun_core::ports::KeyValueStore;
use rukun_core::Error;
use tokio::sync::RwLock;

/// Process-local store; nothing survives a restart
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryKeyValueStore::new();

        assert!(store.get("access_token").await.unwrap().is_none());

        store.set("access_token", "A1").await.unwrap();
        store.set("access_token", "A2").await.unwrap();
        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("A2"));

        store.remove("access_token").await.unwrap();
        store.remove("access_token").await.unwrap();
        assert!(store.get("access_token").await.unwrap().is_none());
    }
}
