//! Delivery strategies. Each either delivers or says why it could not.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use genmedia_storage::{ObjectLocation, ObjectStore, UrlSigner, split_prefix};
use genmedia_types::{GeneratedAsset, OutputDisposition};

use crate::naming::{extension_for, generate_filename};

/// Caller's delivery preferences for one request.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub disposition: OutputDisposition,
    pub output_directory: Option<PathBuf>,
    /// `gs://bucket/prefix/` for uploads.
    pub storage_prefix: Option<String>,
    pub filename_prefix: String,
}

impl DeliveryRequest {
    pub fn inline(filename_prefix: impl Into<String>) -> Self {
        Self {
            disposition: OutputDisposition::Inline,
            output_directory: None,
            storage_prefix: None,
            filename_prefix: filename_prefix.into(),
        }
    }
}

/// Final delivery form.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivered {
    LocalFile {
        path: PathBuf,
        size_bytes: u64,
        mime_type: String,
    },
    Inline {
        data: Bytes,
        mime_type: String,
    },
    ObjectStorage {
        locator: String,
        /// `None` when signing failed; the raw locator is all the caller gets.
        signed_url: Option<String>,
        mime_type: String,
    },
}

/// Why a strategy handed over to the next one.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no payload available")]
    NoPayload,
    #[error("could not write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("no storage location configured")]
    NoDestination,
    #[error("upload to {locator} failed: {message}")]
    Upload { locator: String, message: String },
}

#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn disposition(&self) -> OutputDisposition;

    /// Deliver `asset`, pushing any non-fatal problems onto `warnings`.
    async fn deliver(
        &self,
        asset: &GeneratedAsset,
        request: &DeliveryRequest,
        warnings: &mut Vec<String>,
    ) -> Result<Delivered, DeliveryError>;
}

// ──────────────────── Local file ────────────────────

pub struct LocalFileStrategy;

impl LocalFileStrategy {
    async fn write_new(dir: &std::path::Path, name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        let path = dir.join(name);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        write_or_remove(&path, file, data).await?;
        Ok(path)
    }
}

/// Write `data` through `writer`; on failure remove the partial file at `path`.
async fn write_or_remove<W>(path: &Path, mut writer: W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(data).await?;
        writer.flush().await
    }
    .await;
    if let Err(e) = written {
        drop(writer);
        if let Err(remove_err) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove partial file");
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl DeliveryStrategy for LocalFileStrategy {
    fn disposition(&self) -> OutputDisposition {
        OutputDisposition::LocalFile
    }

    async fn deliver(
        &self,
        asset: &GeneratedAsset,
        request: &DeliveryRequest,
        _warnings: &mut Vec<String>,
    ) -> Result<Delivered, DeliveryError> {
        let payload = asset.payload.as_ref().ok_or(DeliveryError::NoPayload)?;
        let dir = request
            .output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| DeliveryError::Write {
                path: dir.display().to_string(),
                source,
            })?;

        let ext = extension_for(&asset.mime_type);
        let mut attempt = 0;
        let path = loop {
            let name = generate_filename(&request.filename_prefix, ext, Utc::now());
            match Self::write_new(&dir, &name, payload).await {
                Ok(path) => break path,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 3 => {
                    attempt += 1;
                }
                Err(source) => {
                    return Err(DeliveryError::Write {
                        path: dir.join(name).display().to_string(),
                        source,
                    });
                }
            }
        };

        tracing::info!(path = %path.display(), bytes = payload.len(), "Saved output");
        Ok(Delivered::LocalFile {
            path,
            size_bytes: payload.len() as u64,
            mime_type: asset.mime_type.clone(),
        })
    }
}

// ──────────────────── Inline ────────────────────

pub struct InlineStrategy;

#[async_trait]
impl DeliveryStrategy for InlineStrategy {
    fn disposition(&self) -> OutputDisposition {
        OutputDisposition::Inline
    }

    async fn deliver(
        &self,
        asset: &GeneratedAsset,
        _request: &DeliveryRequest,
        _warnings: &mut Vec<String>,
    ) -> Result<Delivered, DeliveryError> {
        let data = asset.payload.clone().ok_or(DeliveryError::NoPayload)?;
        Ok(Delivered::Inline {
            data,
            mime_type: asset.mime_type.clone(),
        })
    }
}

// ──────────────────── Object storage ────────────────────

pub struct ObjectStorageStrategy {
    store: Option<Arc<dyn ObjectStore>>,
    signer: Arc<dyn UrlSigner>,
    ttl: Duration,
}

impl ObjectStorageStrategy {
    pub fn new(
        store: Option<Arc<dyn ObjectStore>>,
        signer: Arc<dyn UrlSigner>,
        ttl: Duration,
    ) -> Self {
        Self { store, signer, ttl }
    }

    /// Signed URL, or `None` plus a warning.
    pub fn sign_or_warn(&self, location: &ObjectLocation, warnings: &mut Vec<String>) -> Option<String> {
        match self.signer.sign(location, self.ttl, Utc::now()) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(object = %location, error = %e, "Signing failed, returning unsigned locator");
                warnings.push(format!(
                    "Could not create a signed URL for {location} ({e}). The storage locator is returned instead; it is not directly playable in a browser."
                ));
                None
            }
        }
    }
}

#[async_trait]
impl DeliveryStrategy for ObjectStorageStrategy {
    fn disposition(&self) -> OutputDisposition {
        OutputDisposition::ObjectStorage
    }

    async fn deliver(
        &self,
        asset: &GeneratedAsset,
        request: &DeliveryRequest,
        warnings: &mut Vec<String>,
    ) -> Result<Delivered, DeliveryError> {
        // Already durable: only sign.
        if let Some(locator) = &asset.locator {
            if let Ok(location) = ObjectLocation::parse(locator) {
                let signed_url = self.sign_or_warn(&location, warnings);
                return Ok(Delivered::ObjectStorage {
                    locator: location.uri(),
                    signed_url,
                    mime_type: asset.mime_type.clone(),
                });
            }
        }

        let payload = asset.payload.clone().ok_or(DeliveryError::NoPayload)?;
        let store = self.store.as_ref().ok_or(DeliveryError::NoDestination)?;
        let (bucket, prefix) = request
            .storage_prefix
            .as_deref()
            .and_then(split_prefix)
            .ok_or(DeliveryError::NoDestination)?;

        let name = generate_filename(
            &request.filename_prefix,
            extension_for(&asset.mime_type),
            Utc::now(),
        );
        let location = ObjectLocation::new(bucket, format!("{prefix}{name}"));
        store
            .upload(&location, payload, &asset.mime_type)
            .await
            .map_err(|e| DeliveryError::Upload {
                locator: location.uri(),
                message: e.to_string(),
            })?;

        let signed_url = self.sign_or_warn(&location, warnings);
        Ok(Delivered::ObjectStorage {
            locator: location.uri(),
            signed_url,
            mime_type: asset.mime_type.clone(),
        })
    }
}
