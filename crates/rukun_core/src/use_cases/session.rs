use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::ApiSettings;
use crate::entities::{
    AuthPayload, Credentials, LoginCredentials, Method, RequestBody, TransportRequest,
    AUTHORIZATION, BEARER_PREFIX,
};
use crate::error::{Error, RefreshFailure};
use crate::ports::{HttpTransport, KeyValueStore, Navigator};

use super::credential_store::CredentialStore;

/// Starts and ends sessions.
///
/// Ending a session always leaves the credential store empty and sends the
/// user to the login route, whether or not the server could be reached.
pub struct SessionController<T, K, N>
where
    T: HttpTransport,
    K: KeyValueStore,
    N: Navigator,
{
    transport: Arc<T>,
    credentials: Arc<CredentialStore<K>>,
    navigator: Arc<N>,
    settings: ApiSettings,
}

impl<T, K, N> SessionController<T, K, N>
where
    T: HttpTransport,
    K: KeyValueStore,
    N: Navigator,
{
    pub fn new(
        transport: Arc<T>,
        credentials: Arc<CredentialStore<K>>,
        navigator: Arc<N>,
        settings: ApiSettings,
    ) -> Self {
        Self {
            transport,
            credentials,
            navigator,
            settings,
        }
    }

    /// Exchange username/password for a token grant and store it
    #[instrument(skip(self, login), fields(username = %login.username))]
    pub async fn login(&self, login: &LoginCredentials) -> Result<Credentials, Error> {
        let body = serde_json::to_value(login)
            .map_err(|e| Error::Other(format!("failed to encode login body: {}", e)))?;

        let request = TransportRequest {
            method: Method::Post,
            url: self.settings.url(&self.settings.login_path),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: RequestBody::Json(body),
        };

        let response = self.transport.send(&request).await?;

        if response.is_unauthorized() {
            warn!("login rejected");
            return Err(Error::Unauthorized(response.payload));
        }
        if !response.is_success() {
            return Err(Error::Api {
                status: response.status,
                payload: response.payload,
            });
        }

        let (access_token, refresh_token, user) =
            AuthPayload::from_body(&response.payload)?.into_parts();
        self.credentials.set(access_token, refresh_token, user).await;

        info!("login successful");
        Ok(self.credentials.get())
    }

    /// Best-effort server logout, then local cleanup and redirect
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let mut request = TransportRequest {
            method: Method::Delete,
            url: self.settings.url(&self.settings.logout_path),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: RequestBody::Empty,
        };
        if let Some(token) = self.credentials.access_token() {
            request.set_header(AUTHORIZATION, format!("{}{}", BEARER_PREFIX, token));
        }

        match self.transport.send(&request).await {
            Ok(response) if response.is_success() => info!("server session closed"),
            Ok(response) => warn!(
                status = response.status,
                message = %response.message(),
                "logout API failed, cleaning up client anyway"
            ),
            Err(e) => warn!(error = %e, "logout API failed, cleaning up client anyway"),
        }

        self.end_session().await;
    }

    /// Session can no longer be refreshed: clean up without contacting the server
    #[instrument(skip(self))]
    pub async fn on_unrecoverable(&self, failure: &RefreshFailure) {
        warn!(reason = %failure, "session could not be refreshed, forcing re-authentication");
        self.end_session().await;
    }

    async fn end_session(&self) {
        self.credentials.clear().await;
        self.navigator.navigate_to(&self.settings.login_route);
    }
}
