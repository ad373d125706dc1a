use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use rukun_core::config::ApiSettings;
use rukun_core::entities::{Method, RequestBody, TransportRequest, TransportResponse};
use rukun_core::ports::HttpTransport;
use rukun_core::Error;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::network::build_api_client;

/// `HttpTransport` over reqwest
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(settings: &ApiSettings) -> Result<Self, Error> {
        settings.validate()?;
        Ok(Self::with_client(build_api_client(settings)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    /// Parse a response body: JSON when possible, otherwise the raw text
    fn parse_body(bytes: &[u8]) -> Value {
        if bytes.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, Error> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::File {
                field,
                file_name,
                bytes,
            } => {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                builder.multipart(Form::new().part(field.clone(), part))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response body: {}", e)))?;

        debug!(status, size = bytes.len(), "response received");

        Ok(TransportResponse::new(status, Self::parse_body(&bytes)))
    }
}
