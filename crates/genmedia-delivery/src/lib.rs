//! genmedia-delivery: turns generated assets into something the caller can use.
//!
//! The [`OutputMaterializer`] walks a per-disposition chain of
//! [`DeliveryStrategy`] implementations. A strategy that cannot deliver hands
//! over to the next one and the reason is kept as a warning, so a tool response
//! always says how the output actually arrived.

pub mod naming;
pub mod strategy;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use genmedia_storage::{ObjectLocation, ObjectStore, UnconfiguredSigner, UrlSigner};
use genmedia_types::{ContentBlock, GeneratedAsset, MediaDomain, OutputDisposition, ToolError};

pub use naming::{extension_for, generate_filename, mime_for_path};
pub use strategy::{
    Delivered, DeliveryError, DeliveryRequest, DeliveryStrategy, InlineStrategy,
    LocalFileStrategy, ObjectStorageStrategy,
};

impl Delivered {
    pub fn disposition(&self) -> OutputDisposition {
        match self {
            Delivered::LocalFile { .. } => OutputDisposition::LocalFile,
            Delivered::Inline { .. } => OutputDisposition::Inline,
            Delivered::ObjectStorage { .. } => OutputDisposition::ObjectStorage,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Delivered::LocalFile { mime_type, .. }
            | Delivered::Inline { mime_type, .. }
            | Delivered::ObjectStorage { mime_type, .. } => mime_type,
        }
    }

    /// One line describing where the output is.
    pub fn summary(&self) -> String {
        match self {
            Delivered::LocalFile {
                path, size_bytes, ..
            } => format!("Saved to {} ({size_bytes} bytes)", path.display()),
            Delivered::Inline { data, mime_type } => {
                format!("Returned inline ({mime_type}, {} bytes)", data.len())
            }
            Delivered::ObjectStorage {
                locator,
                signed_url: Some(url),
                ..
            } => format!("Stored at {locator}. Signed URL: {url}"),
            Delivered::ObjectStorage {
                locator,
                signed_url: None,
                ..
            } => format!("Stored at {locator}"),
        }
    }

    /// Binary block for inline payloads, text otherwise.
    pub fn content_block(&self) -> ContentBlock {
        match self {
            Delivered::Inline { data, mime_type } => ContentBlock::binary(data, mime_type.clone()),
            other => ContentBlock::text(other.summary()),
        }
    }
}

/// A delivered asset plus every fallback or signing warning on the way.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub delivered: Delivered,
    pub warnings: Vec<String>,
}

impl DeliveryResult {
    pub fn fell_back(&self, requested: OutputDisposition) -> bool {
        self.delivered.disposition() != requested
    }
}

/// Default prefix for uploads: `gs://<bucket>/genmedia/<domain>/`.
pub fn default_storage_prefix(bucket: &str, domain: MediaDomain) -> String {
    format!("gs://{}/genmedia/{domain}/", bucket.trim_start_matches("gs://").trim_end_matches('/'))
}

/// Disposition used when the caller did not pick one.
///
/// A local directory wins, then any storage target (explicit or because the
/// backend already wrote remotely), then inline.
pub fn default_disposition(
    explicit: Option<OutputDisposition>,
    output_directory: Option<&str>,
    storage_locator: Option<&str>,
    remote_only: bool,
) -> OutputDisposition {
    if let Some(d) = explicit {
        return d;
    }
    if output_directory.is_some_and(|d| !d.trim().is_empty()) {
        OutputDisposition::LocalFile
    } else if storage_locator.is_some_and(|s| !s.trim().is_empty()) || remote_only {
        OutputDisposition::ObjectStorage
    } else {
        OutputDisposition::Inline
    }
}

// ──────────────────── Materializer ────────────────────

pub struct OutputMaterializer {
    store: Option<Arc<dyn ObjectStore>>,
    local: LocalFileStrategy,
    inline: InlineStrategy,
    object: ObjectStorageStrategy,
}

impl OutputMaterializer {
    pub fn new(
        store: Option<Arc<dyn ObjectStore>>,
        signer: Arc<dyn UrlSigner>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            object: ObjectStorageStrategy::new(store.clone(), signer, signed_url_ttl),
            store,
            local: LocalFileStrategy,
            inline: InlineStrategy,
        }
    }

    /// No object store and no signer: local and inline delivery only.
    pub fn local_only() -> Self {
        Self::new(None, Arc::new(UnconfiguredSigner), Duration::from_secs(900))
    }

    fn chain(&self, disposition: OutputDisposition) -> Vec<&dyn DeliveryStrategy> {
        match disposition {
            OutputDisposition::LocalFile => vec![&self.local, &self.inline],
            OutputDisposition::Inline => vec![&self.inline],
            OutputDisposition::ObjectStorage => vec![&self.object, &self.inline],
        }
    }

    /// Deliver one asset, falling back along the chain for `request.disposition`.
    pub async fn materialize(
        &self,
        asset: GeneratedAsset,
        request: &DeliveryRequest,
    ) -> Result<DeliveryResult, ToolError> {
        let mut warnings = Vec::new();
        let mut asset = asset;

        // Remote-only output needs its bytes for anything but object storage.
        if asset.payload.is_none() && request.disposition != OutputDisposition::ObjectStorage {
            match self.fetch_remote(&asset).await {
                Ok(Some(bytes)) => asset = asset.with_payload(bytes),
                Ok(None) => {}
                Err(reason) => {
                    let locator = asset.locator.clone().unwrap_or_default();
                    tracing::warn!(%locator, error = %reason, "Could not fetch remote output");
                    warnings.push(format!(
                        "Could not fetch {locator} for {} delivery ({reason}); returning the storage location instead.",
                        disposition_label(request.disposition)
                    ));
                    let delivered = self
                        .object
                        .deliver(&asset, request, &mut warnings)
                        .await
                        .map_err(|e| ToolError::Infrastructure(e.to_string()))?;
                    return Ok(DeliveryResult {
                        delivered,
                        warnings,
                    });
                }
            }
        }

        let mut last_error = None;
        for strategy in self.chain(request.disposition) {
            match strategy.deliver(&asset, request, &mut warnings).await {
                Ok(delivered) => {
                    return Ok(DeliveryResult {
                        delivered,
                        warnings,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = disposition_label(strategy.disposition()),
                        error = %e,
                        "Delivery strategy failed, falling back"
                    );
                    warnings.push(format!(
                        "{} delivery failed ({e}); falling back.",
                        capitalize(disposition_label(strategy.disposition()))
                    ));
                    last_error = Some(e);
                }
            }
        }

        Err(ToolError::Infrastructure(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no delivery strategy available".into()),
        ))
    }

    async fn fetch_remote(&self, asset: &GeneratedAsset) -> Result<Option<bytes::Bytes>, String> {
        let Some(locator) = asset.locator.as_deref() else {
            return Ok(None);
        };
        let location = ObjectLocation::parse(locator).map_err(|e| e.to_string())?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| "no object store configured".to_string())?;
        store
            .download(&location)
            .await
            .map(Some)
            .map_err(|e| e.to_string())
    }
}

fn disposition_label(d: OutputDisposition) -> &'static str {
    match d {
        OutputDisposition::LocalFile => "local-file",
        OutputDisposition::Inline => "inline",
        OutputDisposition::ObjectStorage => "object-storage",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve an output directory argument, expanding a leading `~/`.
pub fn resolve_output_dir(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}
