//! Backend requests and the provider trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use genmedia_registry::{NormalizedParams, VoiceInfo};
use genmedia_types::{GeneratedAsset, MediaDomain, OperationHandle, OperationStatus, ProgressUpdate};

use crate::error::BackendError;

/// Where poll ticks are reported, when the caller wants them.
pub type ProgressSink = mpsc::UnboundedSender<ProgressUpdate>;

// ──────────────────── Requests ────────────────────

/// Reference image for image-to-video.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    /// `gs://` URI of the source image.
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: Option<String>,
    pub image: Option<ImageInput>,
    pub params: NormalizedParams,
    /// `gs://bucket/prefix/` the backend writes videos under.
    pub storage_uri: Option<String>,
}

/// Source image for image editing and composition.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceImage {
    Stored(ImageInput),
    Inline { data: Bytes, mime_type: String },
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// Only Gemini image models accept these.
    pub reference_images: Vec<ReferenceImage>,
    pub params: NormalizedParams,
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub model: String,
    pub text: String,
    /// Free-form delivery instructions ("say this cheerfully").
    pub style_prompt: Option<String>,
    pub voice: String,
    pub language_code: String,
    pub encoding: AudioEncoding,
}

#[derive(Debug, Clone)]
pub enum GenerationRequest {
    Video(VideoRequest),
    Image(ImageRequest),
    Speech(SpeechRequest),
}

impl GenerationRequest {
    pub fn domain(&self) -> MediaDomain {
        match self {
            GenerationRequest::Video(_) => MediaDomain::Video,
            GenerationRequest::Image(_) => MediaDomain::Image,
            GenerationRequest::Speech(_) => MediaDomain::Speech,
        }
    }
}

/// What `submit` hands back.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Synchronous backends answer straight away.
    Ready(Vec<GeneratedAsset>),
    /// Asynchronous backends return a handle to poll.
    Pending(OperationHandle),
}

// ──────────────────── Audio encodings ────────────────────

/// Output encodings accepted by the speech backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioEncoding {
    #[default]
    Linear16,
    Mp3,
    OggOpus,
    Mulaw,
    Alaw,
    Pcm,
    M4a,
}

impl AudioEncoding {
    pub const ALL: [AudioEncoding; 7] = [
        AudioEncoding::Linear16,
        AudioEncoding::Mp3,
        AudioEncoding::OggOpus,
        AudioEncoding::Mulaw,
        AudioEncoding::Alaw,
        AudioEncoding::Pcm,
        AudioEncoding::M4a,
    ];

    /// Wire name, e.g. `OGG_OPUS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "LINEAR16",
            AudioEncoding::Mp3 => "MP3",
            AudioEncoding::OggOpus => "OGG_OPUS",
            AudioEncoding::Mulaw => "MULAW",
            AudioEncoding::Alaw => "ALAW",
            AudioEncoding::Pcm => "PCM",
            AudioEncoding::M4a => "M4A",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "audio/wav",
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::OggOpus => "audio/ogg",
            AudioEncoding::Mulaw => "audio/mulaw",
            AudioEncoding::Alaw => "audio/alaw",
            AudioEncoding::Pcm => "audio/pcm",
            AudioEncoding::M4a => "audio/mp4",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "wav",
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::OggOpus => "ogg",
            AudioEncoding::Mulaw => "mulaw",
            AudioEncoding::Alaw => "alaw",
            AudioEncoding::Pcm => "pcm",
            AudioEncoding::M4a => "m4a",
        }
    }
}

impl std::str::FromStr for AudioEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        AudioEncoding::ALL
            .into_iter()
            .find(|e| e.as_str() == upper)
            .ok_or_else(|| {
                let names: Vec<&str> = AudioEncoding::ALL.iter().map(|e| e.as_str()).collect();
                format!(
                    "unsupported audio_encoding '{s}'. Supported encodings: {}",
                    names.join(", ")
                )
            })
    }
}

// ──────────────────── Provider trait ────────────────────

/// A remote generation service for one domain.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Provider identifier.
    fn id(&self) -> &str;

    fn domain(&self) -> MediaDomain;

    /// Start generation. Never retried here.
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, BackendError>;

    /// One status check of a long-running operation.
    async fn poll(&self, _handle: &OperationHandle) -> Result<OperationStatus, BackendError> {
        Err(BackendError::Unsupported("synchronous"))
    }

    /// Voices offered by a speech backend.
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError> {
        Err(BackendError::Unsupported("non-speech"))
    }
}

/// Backends keyed by domain; shared by every request for the life of the process.
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: HashMap<MediaDomain, Arc<dyn GenerationBackend>>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backends.insert(backend.domain(), backend);
        self
    }

    pub fn get(&self, domain: MediaDomain) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        self.backends
            .get(&domain)
            .cloned()
            .ok_or_else(|| BackendError::NotConfigured(domain.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_table() {
        let enc: AudioEncoding = "ogg_opus".parse().unwrap();
        assert_eq!(enc, AudioEncoding::OggOpus);
        assert_eq!(enc.mime_type(), "audio/ogg");
        assert_eq!(enc.extension(), "ogg");
        assert_eq!(AudioEncoding::default().mime_type(), "audio/wav");
        assert_eq!(AudioEncoding::M4a.mime_type(), "audio/mp4");
    }

    #[test]
    fn test_encoding_unknown_lists_supported() {
        let err = "FLAC".parse::<AudioEncoding>().unwrap_err();
        assert!(err.contains("LINEAR16, MP3, OGG_OPUS"));
    }

    #[test]
    fn test_backend_set_missing_domain() {
        let set = BackendSet::new();
        assert!(matches!(
            set.get(MediaDomain::Video),
            Err(BackendError::NotConfigured(_))
        ));
    }
}
