//! Object storage clients.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::auth::TokenProvider;
use crate::error::StorageError;
use crate::locator::ObjectLocation;

const GCS_API_BASE: &str = "https://storage.googleapis.com";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` to `location`, replacing any existing object.
    async fn upload(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        mime_type: &str,
    ) -> Result<(), StorageError>;

    async fn download(&self, location: &ObjectLocation) -> Result<Bytes, StorageError>;
}

/// Cloud Storage JSON API client.
pub struct GcsClient {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    base_url: String,
}

impl GcsClient {
    pub fn new(client: reqwest::Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            tokens,
            base_url: GCS_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn error_from(resp: reqwest::Response, location: &ObjectLocation) -> StorageError {
        let status = resp.status().as_u16();
        if status == 404 {
            return StorageError::NotFound(location.uri());
        }
        let json: serde_json::Value = resp.json().await.unwrap_or_default();
        let message = json
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        StorageError::Api { status, message }
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn upload(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        mime_type: &str,
    ) -> Result<(), StorageError> {
        let token = self.tokens.token().await?;
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, location.bucket);
        let size = data.len();

        let resp = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", location.object.as_str())])
            .bearer_auth(token)
            .header("Content-Type", mime_type)
            .body(data)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp, location).await);
        }
        tracing::info!(object = %location, bytes = size, "Uploaded object");
        Ok(())
    }

    async fn download(&self, location: &ObjectLocation) -> Result<Bytes, StorageError> {
        let token = self.tokens.token().await?;
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|_| StorageError::InvalidLocator(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidLocator(self.base_url.clone()))?
            .pop_if_empty()
            .extend([
                "storage",
                "v1",
                "b",
                location.bucket.as_str(),
                "o",
                location.object.as_str(),
            ]);
        url.query_pairs_mut().append_pair("alt", "media");

        let resp = self.client.get(url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from(resp, location).await);
        }
        let bytes = resp.bytes().await?;
        tracing::debug!(object = %location, bytes = bytes.len(), "Downloaded object");
        Ok(bytes)
    }
}

/// Process-local store keyed by `gs://` URI.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, (Bytes, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type of a stored object.
    pub async fn mime_type(&self, location: &ObjectLocation) -> Option<String> {
        self.objects
            .read()
            .await
            .get(&location.uri())
            .map(|(_, mime)| mime.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        mime_type: &str,
    ) -> Result<(), StorageError> {
        self.objects
            .write()
            .await
            .insert(location.uri(), (data, mime_type.to_string()));
        Ok(())
    }

    async fn download(&self, location: &ObjectLocation) -> Result<Bytes, StorageError> {
        self.objects
            .read()
            .await
            .get(&location.uri())
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(location.uri()))
    }
}
