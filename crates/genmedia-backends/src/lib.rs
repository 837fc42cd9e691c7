//! genmedia-backends: remote generation adapters and the operation poller.
//!
//! Provides:
//! - The [`GenerationBackend`] trait and typed per-domain requests
//! - Vertex AI adapters for video (long-running) and image (Imagen and Gemini, synchronous)
//! - A Cloud Text-to-Speech adapter with voice listing
//! - [`OperationPoller`], which drives a long-running job to a terminal state
//! - [`MediaTransform`], the external ffmpeg/ffprobe step used by `process-media`

pub mod error;
pub mod poller;
pub mod speech;
pub mod transform;
pub mod types;
pub mod vertex;

pub use error::BackendError;
pub use poller::{OperationPoller, PollOutcome, PollState};
pub use speech::CloudTtsBackend;
pub use transform::{
    FfmpegTransform, MAX_INPUTS, MediaTransform, TransformInput, TransformOp, describe_count,
};
pub use types::{
    AudioEncoding, BackendSet, GenerationBackend, GenerationRequest, ImageInput, ImageRequest,
    ProgressSink, ReferenceImage, SpeechRequest, Submission, VideoRequest,
};
pub use vertex::{ImagenBackend, VeoBackend, VertexClient};
