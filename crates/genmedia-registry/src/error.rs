use thiserror::Error;

use genmedia_types::ToolError;

/// Catalog construction failures. Fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate canonical model name '{0}'")]
    DuplicateModel(String),
    #[error("name '{alias}' maps to both '{first}' and '{second}'")]
    AliasCollision {
        alias: String,
        first: String,
        second: String,
    },
    #[error("model '{0}' declares max_outputs = 0")]
    ZeroOutputs(String),
    #[error(
        "model '{model}' has default_duration {duration}, which is not one of its supported durations [{}]",
        join_numbers(.supported)
    )]
    DefaultDurationUnsupported {
        model: String,
        duration: u32,
        supported: Vec<u32>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A request the catalog refuses.
///
/// `UnknownModel` is kept apart from the "known model, bad parameter"
/// variants so a typo reads differently from an unsupported configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("model '{input}' is not a valid or supported model name")]
    UnknownModel {
        input: String,
        domain: String,
        known: Vec<String>,
    },

    #[error(
        "duration '{duration}' is not supported by model {model}. Supported durations are: [{}]",
        join_numbers(.supported)
    )]
    UnsupportedDuration {
        duration: i64,
        model: String,
        supported: Vec<u32>,
    },

    #[error(
        "aspect ratio '{ratio}' is not supported by model {model}. Supported aspect ratios are: {}",
        .supported.join(", ")
    )]
    UnsupportedAspectRatio {
        ratio: String,
        model: String,
        supported: Vec<String>,
    },

    #[error("image size '{size}' is not supported by model {model}{}", size_hint(.supported))]
    UnsupportedImageSize {
        size: String,
        model: String,
        supported: Vec<String>,
    },

    #[error("generate_audio is set to true, but is not supported by model {model}")]
    AudioUnsupported { model: String },

    #[error("text parameter cannot exceed {max} characters (got {actual})")]
    TextTooLong { max: usize, actual: usize },

    #[error("{0}")]
    Language(String),
}

fn join_numbers(values: &[u32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn size_hint(supported: &[String]) -> String {
    if supported.is_empty() {
        ". This model does not accept an image size".to_string()
    } else {
        format!(". Supported sizes are: {}", supported.join(", "))
    }
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownModel {
                input,
                domain,
                known,
            } => ToolError::UnknownModel {
                input,
                domain,
                known,
            },
            other => ToolError::Validation(other.to_string()),
        }
    }
}
