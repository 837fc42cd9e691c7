//! Typed commands decoded from raw tool parameters.
//!
//! Each tool decodes its parameters into one of these structs before doing
//! anything else, so unknown shapes fail fast as validation errors and the
//! tool bodies never touch untyped JSON.

use std::path::PathBuf;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use genmedia_delivery::{
    DeliveryRequest, default_disposition, default_storage_prefix, resolve_output_dir,
};
use genmedia_storage::ensure_gcs_prefix;
use genmedia_types::{GeneratedAsset, MediaDomain, OutputDisposition, ToolError};

/// Decode `params` into `T`, treating `null` as an empty object.
pub fn decode<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T, ToolError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| ToolError::Validation(format!("invalid arguments for {tool}: {e}")))
}

/// Accepts `5`, `5.0` and `"5"`.
fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(d)? {
        None => Ok(None),
        Some(Raw::Int(n)) => Ok(Some(n)),
        Some(Raw::Float(f)) if f.fract() == 0.0 => Ok(Some(f as i64)),
        Some(Raw::Float(f)) => Err(D::Error::custom(format!("expected an integer, got {f}"))),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected an integer, got '{s}'"))),
    }
}

/// Blank or missing is `None`; anything else must name a disposition.
fn opt_disposition<'de, D: Deserializer<'de>>(d: D) -> Result<Option<OutputDisposition>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ──────────────────── Delivery ────────────────────

/// Delivery fields shared by every tool that produces media.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryArgs {
    #[serde(default)]
    pub output_directory: Option<String>,
    /// Bucket or `gs://bucket/prefix`.
    #[serde(default, alias = "bucket", alias = "gcs_bucket_uri")]
    pub storage_locator: Option<String>,
    /// Explicit disposition override, checked while decoding.
    #[serde(default, deserialize_with = "opt_disposition")]
    pub output: Option<OutputDisposition>,
}

impl DeliveryArgs {

    pub fn output_dir(&self) -> Option<PathBuf> {
        non_empty(&self.output_directory).map(resolve_output_dir)
    }

    /// `gs://` prefix for uploads: the caller's locator, else the default
    /// bucket's per-domain prefix.
    pub fn storage_prefix(&self, default_bucket: Option<&str>, domain: MediaDomain) -> Option<String> {
        match non_empty(&self.storage_locator) {
            Some(locator) => Some(ensure_gcs_prefix(locator)),
            None => default_bucket.map(|b| default_storage_prefix(b, domain)),
        }
    }

    /// Delivery request for one asset.
    pub fn request_for(
        &self,
        asset: &GeneratedAsset,
        default_bucket: Option<&str>,
        domain: MediaDomain,
        filename_prefix: &str,
    ) -> DeliveryRequest {
        let disposition = default_disposition(
            self.output,
            non_empty(&self.output_directory),
            non_empty(&self.storage_locator),
            asset.payload.is_none(),
        );
        DeliveryRequest {
            disposition,
            output_directory: self.output_dir(),
            storage_prefix: self.storage_prefix(default_bucket, domain),
            filename_prefix: filename_prefix.to_string(),
        }
    }
}

// ──────────────────── Commands ────────────────────

#[derive(Debug, Deserialize)]
pub struct VideoCommand {
    #[serde(default)]
    pub prompt: Option<String>,
    /// `gs://` image for image-to-video.
    #[serde(default)]
    pub image_uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "num_videos", deserialize_with = "opt_int")]
    pub count: Option<i64>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default, alias = "duration_seconds", deserialize_with = "opt_int")]
    pub duration: Option<i64>,
    #[serde(default)]
    pub generate_audio: Option<bool>,
    #[serde(flatten)]
    pub delivery: DeliveryArgs,
}

impl VideoCommand {
    pub fn prompt(&self) -> Option<&str> {
        non_empty(&self.prompt)
    }

    pub fn image_uri(&self) -> Option<&str> {
        non_empty(&self.image_uri)
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageCommand {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "num_images", deserialize_with = "opt_int")]
    pub count: Option<i64>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub image_size: Option<String>,
    /// Local paths or `gs://` URIs of source images to edit or combine.
    #[serde(default, alias = "reference_images")]
    pub images: Vec<String>,
    #[serde(flatten)]
    pub delivery: DeliveryArgs,
}

#[derive(Debug, Deserialize)]
pub struct SpeechCommand {
    pub text: String,
    #[serde(default, alias = "voice_name")]
    pub voice: Option<String>,
    #[serde(default, alias = "model_name")]
    pub model: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    /// Natural-language style instruction.
    #[serde(default, alias = "prompt")]
    pub style_prompt: Option<String>,
    #[serde(default)]
    pub audio_encoding: Option<String>,
    #[serde(default)]
    pub output_filename_prefix: Option<String>,
    #[serde(flatten)]
    pub delivery: DeliveryArgs,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoicesCommand {
    /// Descriptive name or BCP-47 code.
    #[serde(default, alias = "language_code")]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessCommand {
    /// Local path or `gs://` locator, for single-input operations.
    #[serde(default)]
    pub input: Option<String>,
    /// Ordered inputs for operations that take several.
    #[serde(default)]
    pub inputs: Vec<String>,
    pub operation: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub gain_db: Option<f64>,
    #[serde(default, deserialize_with = "opt_int")]
    pub fps: Option<i64>,
    #[serde(default, deserialize_with = "opt_int")]
    pub width: Option<i64>,
    /// Overlay position in pixels from the top-left corner.
    #[serde(default, deserialize_with = "opt_int")]
    pub x: Option<i64>,
    #[serde(default, deserialize_with = "opt_int")]
    pub y: Option<i64>,
    #[serde(default)]
    pub output_filename_prefix: Option<String>,
    #[serde(flatten)]
    pub delivery: DeliveryArgs,
}

impl ProcessCommand {
    /// `input` followed by `inputs`, blanks dropped.
    pub fn all_inputs(&self) -> Vec<&str> {
        non_empty(&self.input)
            .into_iter()
            .chain(self.inputs.iter().map(|s| s.trim()).filter(|s| !s.is_empty()))
            .collect()
    }
}

/// Text of an optional string parameter, trimmed, `None` when blank.
pub fn text_param(value: &Option<String>) -> Option<&str> {
    non_empty(value)
}
