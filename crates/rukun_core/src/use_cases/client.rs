use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::ApiSettings;
use crate::entities::{ApiRequest, ApiResponse, Credentials, Envelope, LoginCredentials};
use crate::error::Error;
use crate::ports::{HttpTransport, KeyValueStore, Navigator};

use super::credential_store::CredentialStore;
use super::dispatch::RequestDispatcher;
use super::refresh::RefreshCoordinator;
use super::session::SessionController;

/// Authenticated API client: one credential store, one refresh coordinator,
/// one session controller, shared by every request made through it.
pub struct ApiClient<T, K, N>
where
    T: HttpTransport,
    K: KeyValueStore,
    N: Navigator,
{
    credentials: Arc<CredentialStore<K>>,
    session: Arc<SessionController<T, K, N>>,
    refresher: Arc<RefreshCoordinator<T, K, N>>,
    dispatcher: RequestDispatcher<T, K, N>,
}

impl<T, K, N> ApiClient<T, K, N>
where
    T: HttpTransport + 'static,
    K: KeyValueStore + 'static,
    N: Navigator + 'static,
{
    pub fn new(settings: ApiSettings, transport: Arc<T>, storage: Arc<K>, navigator: Arc<N>) -> Self {
        let credentials = Arc::new(CredentialStore::new(storage));
        let session = Arc::new(SessionController::new(
            transport.clone(),
            credentials.clone(),
            navigator,
            settings.clone(),
        ));
        let refresher = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            credentials.clone(),
            session.clone(),
            settings.clone(),
        ));
        let dispatcher =
            RequestDispatcher::new(transport, credentials.clone(), refresher.clone(), settings);

        Self {
            credentials,
            session,
            refresher,
            dispatcher,
        }
    }

    /// Load persisted credentials; call once at startup
    pub async fn restore(&self) -> Credentials {
        self.credentials.restore().await
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.get().is_authenticated()
    }

    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.dispatcher.dispatch(request).await
    }

    /// Dispatch, reject non-2xx statuses and decode the response envelope
    pub async fn fetch<D>(&self, request: ApiRequest) -> Result<Envelope<D>, Error>
    where
        D: DeserializeOwned,
    {
        let payload = self.dispatcher.dispatch(request).await?.into_result()?;
        Envelope::from_value(payload)
    }

    pub async fn login(&self, login: &LoginCredentials) -> Result<Credentials, Error> {
        self.session.login(login).await
    }

    pub async fn logout(&self) {
        self.session.logout().await
    }

    /// Force a token refresh (joins one already running)
    pub async fn refresh(&self) -> Result<String, Error> {
        self.refresher.refresh().await.map_err(Error::RefreshFailed)
    }
}
