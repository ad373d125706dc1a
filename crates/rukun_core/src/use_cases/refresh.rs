use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, instrument};

use crate::config::ApiSettings;
use crate::entities::{
    AuthPayload, Credentials, Method, RequestBody, TransportRequest, AUTHORIZATION, BEARER_PREFIX,
};
use crate::error::{Error, RefreshFailure};
use crate::ports::{HttpTransport, KeyValueStore, Navigator};

use super::credential_store::CredentialStore;
use super::session::SessionController;

pub type RefreshOutcome = Result<String, RefreshFailure>;

type PendingOutcome = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    id: u64,
    outcome: PendingOutcome,
}

/// Exchanges the refresh token for a new access token, one exchange at a time.
///
/// Overlapping callers share a single network exchange and all observe its
/// outcome. The exchange runs on its own task, so it completes (and updates
/// the credential store) even if every caller stops waiting.
pub struct RefreshCoordinator<T, K, N>
where
    T: HttpTransport,
    K: KeyValueStore,
    N: Navigator,
{
    transport: Arc<T>,
    credentials: Arc<CredentialStore<K>>,
    session: Arc<SessionController<T, K, N>>,
    settings: ApiSettings,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_id: AtomicU64,
}

impl<T, K, N> RefreshCoordinator<T, K, N>
where
    T: HttpTransport + 'static,
    K: KeyValueStore + 'static,
    N: Navigator + 'static,
{
    pub fn new(
        transport: Arc<T>,
        credentials: Arc<CredentialStore<K>>,
        session: Arc<SessionController<T, K, N>>,
        settings: ApiSettings,
    ) -> Self {
        Self {
            transport,
            credentials,
            session,
            settings,
            in_flight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join the in-flight refresh or start a new one
    pub async fn refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(current) => {
                    debug!(refresh_id = current.id, "joining in-flight refresh");
                    current.outcome.clone()
                }
                None => self.start(&mut slot),
            }
        };
        pending.await
    }

    /// Like `refresh`, for a request that failed while carrying `sent_token`.
    ///
    /// If no refresh is running and the store already holds a different
    /// access token, a refresh finished after that request was sent: the
    /// current token is returned without another exchange. If the store was
    /// emptied since then, the session already ended and nothing is retried.
    pub async fn refresh_after(&self, sent_token: Option<&str>) -> RefreshOutcome {
        let pending = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(current) => {
                    debug!(refresh_id = current.id, "joining in-flight refresh");
                    current.outcome.clone()
                }
                None => match (self.credentials.access_token(), sent_token) {
                    (Some(token), _) if Some(token.as_str()) != sent_token => {
                        debug!("token already rotated, skipping refresh");
                        return Ok(token);
                    }
                    (None, Some(_)) => {
                        debug!("session ended while request was in flight");
                        return Err(RefreshFailure::SessionEnded);
                    }
                    _ => self.start(&mut slot),
                },
            }
        };
        pending.await
    }

    /// Whether an exchange is currently running
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn start(&self, slot: &mut Option<InFlight>) -> PendingOutcome {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let transport = self.transport.clone();
        let credentials = self.credentials.clone();
        let session = self.session.clone();
        let settings = self.settings.clone();
        let in_flight = self.in_flight.clone();

        debug!(refresh_id = id, "starting session refresh");

        let task = tokio::spawn(async move {
            let (epoch, current) = credentials.snapshot();
            let outcome = exchange(transport.as_ref(), &credentials, epoch, current, &settings).await;
            match &outcome {
                Ok(_) => info!(refresh_id = id, "session refreshed"),
                // Logout or a new login already settled the session
                Err(failure) if credentials.epoch() != epoch => {
                    debug!(refresh_id = id, %failure, "session changed during refresh")
                }
                // Waiters joining from here on still get this outcome
                Err(failure) => session.on_unrecoverable(failure).await,
            }

            let mut slot = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().map(|f| f.id) == Some(id) {
                *slot = None;
            }
            outcome
        });

        let outcome = async move {
            task.await.unwrap_or_else(|e| {
                Err(RefreshFailure::Network(format!("refresh task failed: {}", e)))
            })
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }
}

/// One network exchange for the session `epoch`. Credentials are only
/// written on success, and only while that session is still current.
#[instrument(skip_all, fields(epoch))]
async fn exchange<T, K>(
    transport: &T,
    credentials: &CredentialStore<K>,
    epoch: u64,
    current: Credentials,
    settings: &ApiSettings,
) -> RefreshOutcome
where
    T: HttpTransport,
    K: KeyValueStore,
{
    let refresh_token = current.refresh_token.ok_or(RefreshFailure::NoRefreshToken)?;

    let request = TransportRequest {
        method: Method::Put,
        url: settings.url(&settings.refresh_path),
        headers: vec![
            ("Accept".to_string(), "application/json".to_string()),
            (
                AUTHORIZATION.to_string(),
                format!("{}{}", BEARER_PREFIX, refresh_token),
            ),
        ],
        body: RequestBody::Empty,
    };

    let sent = tokio::time::timeout(settings.refresh_timeout(), transport.send(&request)).await;
    let response = match sent {
        Err(_) => return Err(RefreshFailure::Timeout),
        Ok(Err(Error::Network(msg))) => return Err(RefreshFailure::Network(msg)),
        Ok(Err(e)) => return Err(RefreshFailure::Network(e.to_string())),
        Ok(Ok(response)) => response,
    };

    if !response.is_success() {
        return Err(RefreshFailure::ServerRejected {
            status: response.status,
            message: response.message(),
        });
    }

    let (access_token, refresh_token, user) = AuthPayload::from_body(&response.payload)
        .map_err(|e| RefreshFailure::ServerRejected {
            status: response.status,
            message: e.to_string(),
        })?
        .into_parts();

    if !credentials
        .rotate(epoch, access_token.clone(), refresh_token, user)
        .await
    {
        return Err(RefreshFailure::SessionEnded);
    }

    Ok(access_token)
}
