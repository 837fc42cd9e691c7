//! genmedia-types: data model shared by every gateway crate.
//!
//! Nothing in here talks to the network or the filesystem; it only describes
//! invocations, generated assets, long-running operations and the structured
//! results handed back to callers.

pub mod error;

use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::ToolError;

// ──────────────────── Invocation Types ────────────────────

/// Generation domain a model or tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaDomain {
    Video,
    Image,
    Speech,
    Transform,
}

impl MediaDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDomain::Video => "video",
            MediaDomain::Image => "image",
            MediaDomain::Speech => "speech",
            MediaDomain::Transform => "transform",
        }
    }
}

impl std::fmt::Display for MediaDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery form requested for generated bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputDisposition {
    /// Write under a local directory.
    LocalFile,
    /// Base64 payload embedded in the response.
    Inline,
    /// Durable object plus a time-limited access URL.
    ObjectStorage,
}

impl std::str::FromStr for OutputDisposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "local-file" | "local" | "file" => Ok(OutputDisposition::LocalFile),
            "inline" => Ok(OutputDisposition::Inline),
            "object-storage" | "storage" | "gcs" => Ok(OutputDisposition::ObjectStorage),
            other => Err(format!(
                "unknown output disposition '{other}'. Expected one of: local-file, inline, object-storage"
            )),
        }
    }
}

/// A transport-agnostic request to run one operation.
///
/// Lives for exactly one request; the typed decode step turns `parameters`
/// into a per-operation command before any business logic runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Operation (tool) name, e.g. `generate-video`.
    pub operation: String,
    /// Raw named parameters as received on the wire.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(operation: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            operation: operation.into(),
            parameters,
        }
    }
}

// ──────────────────── Result Types ────────────────────

/// One independently renderable block of a tool response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Status or error prose.
    Text { text: String },
    /// Base64 payload with its declared MIME type.
    Binary { data: String, mime_type: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Encode raw bytes as a binary block.
    pub fn binary(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        ContentBlock::Binary {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Binary { .. } => None,
        }
    }
}

/// Ordered content blocks returned by a tool, success or failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// A single-text-block failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }

    /// Concatenate all text blocks, one per line.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ──────────────────── Asset Types ────────────────────

/// Output of a backend adapter, consumed once by the output materializer.
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    /// Where the backend put the object, if it stored it remotely (e.g. `gs://bucket/key`).
    pub locator: Option<String>,
    /// In-memory bytes, when the backend returned them inline.
    pub payload: Option<Bytes>,
    /// Declared content type.
    pub mime_type: String,
    /// Payload size in bytes (0 when only a locator is known).
    pub size_bytes: u64,
}

impl GeneratedAsset {
    pub fn from_bytes(payload: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        let payload = payload.into();
        Self {
            locator: None,
            size_bytes: payload.len() as u64,
            payload: Some(payload),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_locator(locator: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            locator: Some(locator.into()),
            payload: None,
            mime_type: mime_type.into(),
            size_bytes: 0,
        }
    }

    /// Attach bytes fetched after the fact (keeps the locator).
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.size_bytes = payload.len() as u64;
        self.payload = Some(payload);
        self
    }
}

// ──────────────────── Operation Types ────────────────────

/// Backend-assigned reference to an in-progress asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    /// Opaque operation name, e.g. `projects/p/locations/l/.../operations/123`.
    pub name: String,
    /// Canonical model the job was submitted against.
    pub model: String,
    pub submitted_at: DateTime<Utc>,
}

impl OperationHandle {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Status reported by a backend for one poll of an operation.
#[derive(Debug, Clone)]
pub enum OperationStatus {
    Pending,
    DoneOk(Vec<GeneratedAsset>),
    /// The backend's own error text, unmodified.
    DoneError(String),
}

/// A progress notification emitted while a long-running job is tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Monotonic counter (poll ticks so far).
    pub progress: u64,
    pub message: String,
}
