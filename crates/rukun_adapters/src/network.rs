//! Shared HTTP client configuration.

use std::time::Duration;

use reqwest::Client;
use rukun_core::config::ApiSettings;
use rukun_core::Error;

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const USER_AGENT: &str = concat!("rukun/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used for every API call.
///
/// Request timeout comes from `api.request_timeout_secs`; cookies are not
/// kept since authentication travels in the `Authorization` header.
pub fn build_api_client(settings: &ApiSettings) -> Result<Client, Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(settings.request_timeout())
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| Error::Network(format!("failed to create API HTTP client: {}", e)))
}
