//! `generate-video` tool — text- or image-to-video through a long-running operation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use genmedia_backends::{GenerationRequest, ImageInput, ProgressSink, VideoRequest};
use genmedia_registry::GenerationParams;
use genmedia_types::{MediaDomain, ToolError, ToolResult};

use crate::context::ToolContext;
use crate::params::{VideoCommand, decode};
use crate::runner::{deliver_all, generate, result_blocks};
use crate::tools::GENERATE_VIDEO;
use crate::{Tool, ToolDefinition};

pub const DEFAULT_VIDEO_MODEL: &str = "veo-2.0-generate-001";

pub struct GenerateVideoTool {
    ctx: Arc<ToolContext>,
    definition: ToolDefinition,
}

impl GenerateVideoTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let definition = ToolDefinition {
            name: GENERATE_VIDEO.to_string(),
            description: "Generate a video from a text prompt, or from a Cloud Storage image plus an optional prompt. Videos are written to Cloud Storage when a bucket is available and can also be saved locally or returned inline.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Text prompt for video generation. Required unless image_uri is given."
                    },
                    "image_uri": {
                        "type": "string",
                        "description": "gs:// URI of a starting image for image-to-video."
                    },
                    "mime_type": {
                        "type": "string",
                        "enum": ["image/png", "image/jpeg"],
                        "description": "MIME type of image_uri. Inferred from the extension when omitted."
                    },
                    "model": {
                        "type": "string",
                        "default": DEFAULT_VIDEO_MODEL,
                        "description": ctx.registry.describe(MediaDomain::Video)
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of videos. Values above the model maximum are reduced to it."
                    },
                    "aspect_ratio": {
                        "type": "string",
                        "description": "Aspect ratio, e.g. 16:9 or 9:16. Defaults to the model's first supported ratio."
                    },
                    "duration": {
                        "type": "integer",
                        "description": "Duration in seconds; must be one the model supports."
                    },
                    "generate_audio": {
                        "type": "boolean",
                        "description": "Generate an audio track (audio-capable models only)."
                    },
                    "storage_locator": {
                        "type": "string",
                        "description": "Bucket or gs://bucket/prefix for outputs. Defaults to the configured bucket."
                    },
                    "output_directory": {
                        "type": "string",
                        "description": "Local directory to save videos into."
                    },
                    "output": {
                        "type": "string",
                        "enum": ["local-file", "inline", "object-storage"],
                        "description": "Override how results are delivered."
                    }
                },
                "required": []
            }),
        };
        Self { ctx, definition }
    }
}

/// Validate an image-to-video source and settle its MIME type.
fn image_input(uri: &str, mime_type: Option<&str>) -> Result<ImageInput, ToolError> {
    if !uri.starts_with("gs://") {
        return Err(ToolError::Validation(format!(
            "image_uri must be a Cloud Storage URI (gs://bucket/object), got '{uri}'"
        )));
    }
    let mime = match mime_type.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_ascii_lowercase(),
        None => infer_image_mime(uri)
            .ok_or_else(|| {
                ToolError::Validation(format!(
                    "mime_type is required: it could not be inferred from image_uri '{uri}'. Supported types are image/jpeg and image/png"
                ))
            })?
            .to_string(),
    };
    if mime != "image/png" && mime != "image/jpeg" {
        return Err(ToolError::Validation(format!(
            "unsupported mime_type '{mime}'. Supported types are image/jpeg and image/png"
        )));
    }
    Ok(ImageInput {
        uri: uri.to_string(),
        mime_type: mime,
    })
}

fn infer_image_mime(uri: &str) -> Option<&'static str> {
    let lower = uri.to_ascii_lowercase();
    if lower.ends_with(".png") {
        Some("image/png")
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        Some("image/jpeg")
    } else {
        None
    }
}

#[async_trait]
impl Tool for GenerateVideoTool {
    fn name(&self) -> &str {
        GENERATE_VIDEO
    }

    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        cancel: CancellationToken,
        progress: Option<ProgressSink>,
    ) -> Result<ToolResult, ToolError> {
        let cmd: VideoCommand = decode(GENERATE_VIDEO, params)?;

        let image = cmd
            .image_uri()
            .map(|uri| image_input(uri, cmd.mime_type.as_deref()))
            .transpose()?;
        let prompt = cmd.prompt().map(String::from);
        if prompt.is_none() && image.is_none() {
            return Err(ToolError::Validation(
                "prompt must be a non-empty string unless image_uri is provided".into(),
            ));
        }

        let model_input = crate::params::text_param(&cmd.model).unwrap_or(DEFAULT_VIDEO_MODEL);
        let model = self.ctx.registry.resolve_in(MediaDomain::Video, model_input)?;
        let normalized = self.ctx.registry.validate(
            &model.canonical_name,
            &GenerationParams {
                count: cmd.count,
                duration: cmd.duration,
                aspect_ratio: cmd.aspect_ratio.clone(),
                generate_audio: cmd.generate_audio,
                ..Default::default()
            },
        )?;

        let storage_uri = cmd
            .delivery
            .storage_prefix(self.ctx.default_bucket.as_deref(), MediaDomain::Video);
        tracing::info!(
            tool = GENERATE_VIDEO,
            model = %normalized.model,
            count = normalized.count,
            duration = ?normalized.duration,
            image_to_video = image.is_some(),
            "Starting video generation"
        );

        let model_name = normalized.model.clone();
        let request = GenerationRequest::Video(VideoRequest {
            prompt,
            image,
            params: normalized,
            storage_uri,
        });
        let assets = generate(&self.ctx, request, &cancel, progress.as_ref()).await?;
        if assets.is_empty() {
            return Err(ToolError::BackendOperation(
                "operation completed but returned no videos".into(),
            ));
        }

        let results = deliver_all(&self.ctx, assets, &cmd.delivery, MediaDomain::Video, "veo").await?;
        let headline = format!(
            "Video generation with {model_name} complete: {} video(s) produced.",
            results.len()
        );
        Ok(ToolResult::success(result_blocks(headline, &results)))
    }
}
