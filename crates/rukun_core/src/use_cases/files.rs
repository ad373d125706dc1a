use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::entities::{ApiRequest, Envelope};
use crate::error::Error;
use crate::ports::{HttpTransport, KeyValueStore, Navigator};

use super::client::ApiClient;

const UPLOAD_PATH: &str = "/file/upload";
const REMOVE_PATH: &str = "/file/remove";

/// Upload and removal of attachments (photos, documents) through the API
pub struct FileService<T, K, N>
where
    T: HttpTransport,
    K: KeyValueStore,
    N: Navigator,
{
    client: Arc<ApiClient<T, K, N>>,
}

impl<T, K, N> FileService<T, K, N>
where
    T: HttpTransport + 'static,
    K: KeyValueStore + 'static,
    N: Navigator + 'static,
{
    pub fn new(client: Arc<ApiClient<T, K, N>>) -> Self {
        Self { client }
    }

    /// Upload one file. Returns the server's `data` (usually the file URL)
    /// when the envelope reports success, `None` otherwise.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<Option<Value>, Error> {
        let request = ApiRequest::post(UPLOAD_PATH).with_file("file", file_name, bytes);
        let envelope: Envelope<Value> = self.client.fetch(request).await?;

        if !envelope.is_ok() {
            warn!(message = ?envelope.message, "upload not accepted");
            return Ok(None);
        }
        Ok(envelope.data)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, file_url: &str) -> Result<Envelope<Value>, Error> {
        let request = ApiRequest::delete(REMOVE_PATH).with_json(json!({ "file": file_url }));
        self.client.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Method, RequestBody, TransportResponse};
    use crate::use_cases::testing::{settings, FakeTransport, MemoryStore, RecordingNavigator};

    fn service(
        transport: FakeTransport,
    ) -> (
        FileService<FakeTransport, MemoryStore, RecordingNavigator>,
        Arc<FakeTransport>,
    ) {
        let transport = Arc::new(transport);
        let client = ApiClient::new(
            settings(),
            transport.clone(),
            Arc::new(MemoryStore::default()),
            Arc::new(RecordingNavigator::default()),
        );
        (FileService::new(Arc::new(client)), transport)
    }

    #[tokio::test]
    async fn test_upload_returns_data() {
        let (files, transport) = service(FakeTransport::new(|_| {
            Ok(TransportResponse::new(
                200,
                json!({"status": 1, "data": "https://cdn.test/ktp.jpg"}),
            ))
        }));

        let data = files.upload("ktp.jpg", vec![1, 2, 3]).await.unwrap();

        assert_eq!(data, Some(json!("https://cdn.test/ktp.jpg")));
        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].url, "http://api.test/file/upload");
        assert_eq!(
            sent[0].body,
            RequestBody::File {
                field: "file".to_string(),
                file_name: "ktp.jpg".to_string(),
                bytes: vec![1, 2, 3],
            }
        );
    }

    #[tokio::test]
    async fn test_upload_rejected_by_envelope() {
        let (files, _) = service(FakeTransport::new(|_| {
            Ok(TransportResponse::new(200, json!({"status": 0, "message": "too large"})))
        }));

        assert_eq!(files.upload("big.png", vec![0; 16]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_sends_file_url() {
        let (files, transport) = service(FakeTransport::new(|_| {
            Ok(TransportResponse::new(200, json!({"status": 1, "message": "deleted"})))
        }));

        let envelope = files.remove("https://cdn.test/ktp.jpg").await.unwrap();

        assert!(envelope.is_ok());
        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::Delete);
        assert_eq!(
            sent[0].body,
            RequestBody::Json(json!({"file": "https://cdn.test/ktp.jpg"}))
        );
    }
}
