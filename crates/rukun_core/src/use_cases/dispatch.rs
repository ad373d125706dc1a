use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::ApiSettings;
use crate::entities::{ApiRequest, ApiResponse, TransportRequest, AUTHORIZATION, BEARER_PREFIX};
use crate::error::Error;
use crate::ports::{HttpTransport, KeyValueStore, Navigator};

use super::credential_store::CredentialStore;
use super::refresh::RefreshCoordinator;

/// Sends API requests with the current bearer token and recovers from an
/// expired token by refreshing once and replaying the request once.
pub struct RequestDispatcher<T, K, N>
where
    T: HttpTransport,
    K: KeyValueStore,
    N: Navigator,
{
    transport: Arc<T>,
    credentials: Arc<CredentialStore<K>>,
    refresher: Arc<RefreshCoordinator<T, K, N>>,
    settings: ApiSettings,
    auth_paths: Vec<String>,
}

impl<T, K, N> RequestDispatcher<T, K, N>
where
    T: HttpTransport + 'static,
    K: KeyValueStore + 'static,
    N: Navigator + 'static,
{
    pub fn new(
        transport: Arc<T>,
        credentials: Arc<CredentialStore<K>>,
        refresher: Arc<RefreshCoordinator<T, K, N>>,
        settings: ApiSettings,
    ) -> Self {
        let auth_paths = settings.auth_paths();
        Self {
            transport,
            credentials,
            refresher,
            settings,
            auth_paths,
        }
    }

    /// Send `request`. Any response other than 401 is returned untouched,
    /// including error statuses.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse, Error> {
        let sent_token = self.credentials.access_token();
        let response = self.send(&request, sent_token.as_deref()).await?;

        if !response.is_unauthorized() {
            return Ok(response);
        }

        if request.retried || request.targets_any(&self.auth_paths) {
            debug!(retried = request.retried, "authorization failure is final");
            return Err(Error::Unauthorized(response.payload));
        }

        request.retried = true;
        debug!("access token rejected, refreshing session");

        let token = self
            .refresher
            .refresh_after(sent_token.as_deref())
            .await
            .map_err(|failure| {
                warn!(reason = %failure, "giving up on request after failed refresh");
                Error::RefreshFailed(failure)
            })?;

        let replayed = self.send(&request, Some(&token)).await?;
        if replayed.is_unauthorized() {
            warn!("request rejected again after refresh");
            return Err(Error::Unauthorized(replayed.payload));
        }
        Ok(replayed)
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, Error> {
        let wire = self.to_transport(request, token);
        self.transport.send(&wire).await
    }

    fn to_transport(&self, request: &ApiRequest, token: Option<&str>) -> TransportRequest {
        let mut wire = TransportRequest {
            method: request.method,
            url: self.settings.url(&request.path),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: request.body.clone(),
        };
        for (name, value) in &request.headers {
            wire.set_header(name, value.clone());
        }
        if let Some(token) = token {
            wire.set_header(AUTHORIZATION, format!("{}{}", BEARER_PREFIX, token));
        }
        wire
    }
}
