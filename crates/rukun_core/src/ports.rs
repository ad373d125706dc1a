use async_trait::async_trait;

use crate::entities::{TransportRequest, TransportResponse};
use crate::error::Error;

/// Outbound HTTP collaborator.
///
/// Only connection-level failures are errors; every HTTP status (including
/// 401 and 5xx) comes back as a `TransportResponse`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, Error>;
}

/// Durable string key-value storage (keyring, file, memory)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never set or was removed
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Delete a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Moves the user to another screen/entry point (e.g. the login page)
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, route: &str);
}
