//! genmedia-registry: the capability catalog every request is validated against.
//!
//! The registry is built once at startup (built-in catalog or a JSON file,
//! plus the voice catalog fetched from the speech backend) and then shared
//! read-only behind an `Arc`. Nothing in it mutates after `build()`.

pub mod error;
pub mod languages;
pub mod model;
pub mod registry;
pub mod voices;

pub use error::{RegistryError, ValidationError};
pub use languages::{LanguageMatch, LanguageTable};
pub use model::{ModelDescriptor, builtin_models, is_gemini_image_model};
pub use registry::{CapabilityRegistry, GenerationParams, NormalizedParams, RegistryBuilder};
pub use voices::{VoiceCatalog, VoiceInfo};
