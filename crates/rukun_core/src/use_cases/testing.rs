//! In-memory doubles for the ports, shared by the use case tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Barrier;

use crate::config::ApiSettings;
use crate::entities::{TransportRequest, TransportResponse};
use crate::error::Error;
use crate::ports::{HttpTransport, KeyValueStore, Navigator};

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            fail: true,
        }
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        if self.fail {
            return Err(Error::CredentialStorage("storage offline".to_string()));
        }
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        if self.fail {
            return Err(Error::CredentialStorage("storage offline".to_string()));
        }
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        if self.fail {
            return Err(Error::CredentialStorage("storage offline".to_string()));
        }
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

type Responder = dyn Fn(&TransportRequest) -> Result<TransportResponse, Error> + Send + Sync;

/// Scripted transport. Every request is recorded, then answered by `respond`.
pub struct FakeTransport {
    respond: Box<Responder>,
    requests: Mutex<Vec<TransportRequest>>,
    delays: Vec<(String, Duration)>,
    gate: Option<(String, usize, Arc<Barrier>)>,
    gate_passes: AtomicUsize,
}

impl FakeTransport {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, Error> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
            delays: Vec::new(),
            gate: None,
            gate_passes: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering requests whose URL contains `path`
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.push((path.to_string(), delay));
        self
    }

    /// Hold the first `parties` requests to `path` until all of them arrived
    pub fn with_gate(mut self, path: &str, parties: usize) -> Self {
        self.gate = Some((path.to_string(), parties, Arc::new(Barrier::new(parties))));
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(path))
            .count()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, Error> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some((path, parties, barrier)) = &self.gate {
            if request.url.contains(path.as_str()) {
                let pass = self.gate_passes.fetch_add(1, Ordering::SeqCst);
                if pass < *parties {
                    barrier.wait().await;
                }
            }
        }

        for (path, delay) in &self.delays {
            if request.url.contains(path.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }

        (self.respond)(request)
    }
}

pub fn settings() -> ApiSettings {
    ApiSettings {
        base_url: "http://api.test".to_string(),
        ..ApiSettings::default()
    }
}

pub fn grant(access: &str, refresh: &str) -> TransportResponse {
    TransportResponse::new(
        200,
        json!({
            "status": 1,
            "message": "ok",
            "data": {
                "auth": {"access_token": access, "refresh": {"token": refresh}},
                "user": {"name": "Pak RT", "role": "admin"}
            }
        }),
    )
}

pub fn unauthorized() -> TransportResponse {
    TransportResponse::new(401, json!({"status": 0, "message": "Unauthenticated."}))
}

pub fn ok(data: Value) -> TransportResponse {
    TransportResponse::new(200, json!({"status": 1, "data": data}))
}
