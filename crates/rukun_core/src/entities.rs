use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Opaque identity of the logged-in user, as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(Value);

impl UserIdentity {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Convenience lookup of a string field (e.g. `name`, `email`)
    pub fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Current session credentials. All three fields change together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserIdentity>,
}

impl Credentials {
    pub fn new(access_token: String, refresh_token: String, user: Option<UserIdentity>) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            user,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Username/password pair sent to the login endpoint (never persisted)
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body. Cloneable so a request can be replayed unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Single multipart file part
    File {
        field: String,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// A logical API request, relative to the configured base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub path: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Set once the request has been replayed after a refresh; never replayed again
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            headers: Vec::new(),
            body: RequestBody::Empty,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_file(mut self, field: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        self.body = RequestBody::File {
            field: field.to_string(),
            file_name: file_name.to_string(),
            bytes,
        };
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Opt out of automatic refresh-and-replay for this request
    pub fn already_retried(mut self) -> Self {
        self.retried = true;
        self
    }

    /// Whether the path hits one of the given authentication endpoints
    pub fn targets_any(&self, paths: &[String]) -> bool {
        paths.iter().any(|p| !p.is_empty() && self.path.contains(p.as_str()))
    }
}

/// Wire-level request handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace any existing header with the same (case-insensitive) name
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }

    /// Bearer token from the Authorization header, if any
    pub fn bearer(&self) -> Option<&str> {
        self.header(AUTHORIZATION)
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
    }
}

pub const AUTHORIZATION: &str = "Authorization";
pub const BEARER_PREFIX: &str = "Bearer ";

/// Status and parsed body returned by the transport.
/// Non-JSON bodies are carried as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub payload: Value,
}

impl TransportResponse {
    pub fn new(status: u16, payload: Value) -> Self {
        Self { status, payload }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Response handed back to callers of the dispatcher
pub type ApiResponse = TransportResponse;

impl ApiResponse {
    /// Turn non-2xx responses into `Error::Api`
    pub fn into_result(self) -> Result<Value, Error> {
        if self.is_success() {
            Ok(self.payload)
        } else {
            Err(Error::Api {
                status: self.status,
                payload: self.payload,
            })
        }
    }

    pub fn envelope<T: DeserializeOwned>(&self) -> Result<Envelope<T>, Error> {
        Envelope::from_value(self.payload.clone())
    }

    /// Human-readable message from an error payload
    pub fn message(&self) -> String {
        payload_message(&self.payload)
    }
}

pub(crate) fn payload_message(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Standard response body of the platform API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T: DeserializeOwned> Envelope<T> {
    pub const OK: i64 = 1;

    pub fn from_value(value: Value) -> Result<Self, Error> {
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidServerResponse(format!("malformed envelope: {}", e)))
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshGrant {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh: RefreshGrant,
}

/// Token grant returned by the login and refresh endpoints
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthPayload {
    pub auth: AuthTokens,
    #[serde(default)]
    pub user: Option<Value>,
}

impl AuthPayload {
    /// Parse a grant either bare or wrapped in the envelope's `data` field
    pub fn from_body(body: &Value) -> Result<Self, Error> {
        let source = match body.get("data") {
            Some(data) if data.get("auth").is_some() => data,
            _ => body,
        };
        serde_json::from_value(source.clone())
            .map_err(|e| Error::InvalidServerResponse(format!("malformed auth payload: {}", e)))
    }

    /// Split into (access token, refresh token, user)
    pub fn into_parts(self) -> (String, String, Option<UserIdentity>) {
        (
            self.auth.access_token,
            self.auth.refresh.token,
            self.user.filter(|u| !u.is_null()).map(UserIdentity::new),
        )
    }
}
