//! Tool implementations, one module per operation.

pub mod image;
pub mod process;
pub mod speech;
pub mod video;
pub mod voices;

pub const GENERATE_VIDEO: &str = "generate-video";
pub const GENERATE_IMAGE: &str = "generate-image";
pub const SYNTHESIZE_SPEECH: &str = "synthesize-speech";
pub const LIST_VOICES: &str = "list-voices";
pub const PROCESS_MEDIA: &str = "process-media";
