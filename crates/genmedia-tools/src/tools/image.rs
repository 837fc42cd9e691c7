//! `generate-image` tool — Imagen text-to-image and Gemini image generation and editing.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use genmedia_backends::{GenerationRequest, ImageInput, ImageRequest, ProgressSink, ReferenceImage};
use genmedia_registry::{GenerationParams, is_gemini_image_model};
use genmedia_types::{MediaDomain, ToolError, ToolResult};

use crate::context::ToolContext;
use crate::params::{ImageCommand, decode, text_param};
use crate::runner::{deliver_all, generate, result_blocks};
use crate::tools::GENERATE_IMAGE;
use crate::{Tool, ToolDefinition};

pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
const MAX_REFERENCE_IMAGES: usize = 14;

pub struct GenerateImageTool {
    ctx: Arc<ToolContext>,
    definition: ToolDefinition,
}

impl GenerateImageTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let definition = ToolDefinition {
            name: GENERATE_IMAGE.to_string(),
            description: "Generate images from a text prompt with Imagen, or generate and edit images with Gemini image models (Nano Banana), which also accept source images to edit or combine.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Text description of the image."
                    },
                    "negative_prompt": {
                        "type": "string",
                        "description": "What the image should not contain."
                    },
                    "model": {
                        "type": "string",
                        "default": DEFAULT_IMAGE_MODEL,
                        "description": ctx.registry.describe(MediaDomain::Image)
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of images. Values above the model maximum are reduced to it."
                    },
                    "aspect_ratio": {
                        "type": "string",
                        "default": "1:1",
                        "description": "Imagen models take 1:1, 3:4, 4:3, 9:16 or 16:9. Gemini image models also take 2:3, 3:2, 4:5, 5:4 and 21:9."
                    },
                    "image_size": {
                        "type": "string",
                        "description": "Output size (1K, 2K or 4K), only for models that list sizes."
                    },
                    "images": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Gemini image models only. Local file paths or gs:// URIs of PNG, JPEG or WebP images to edit or combine."
                    },
                    "storage_locator": {
                        "type": "string",
                        "description": "Bucket or gs://bucket/prefix to upload images to."
                    },
                    "output_directory": {
                        "type": "string",
                        "description": "Local directory to save images into."
                    },
                    "output": {
                        "type": "string",
                        "enum": ["local-file", "inline", "object-storage"]
                    }
                },
                "required": ["prompt"]
            }),
        };
        Self { ctx, definition }
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        GENERATE_IMAGE
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
        let cmd: ImageCommand = decode(GENERATE_IMAGE, params)?;
        let prompt = cmd.prompt.trim();
        if prompt.is_empty() {
            return Err(ToolError::Validation(
                "prompt must be a non-empty string".into(),
            ));
        }

        let model_input = text_param(&cmd.model).unwrap_or(DEFAULT_IMAGE_MODEL);
        let model = self.ctx.registry.resolve_in(MediaDomain::Image, model_input)?;
        let normalized = self.ctx.registry.validate(
            &model.canonical_name,
            &GenerationParams {
                count: cmd.count,
                aspect_ratio: cmd.aspect_ratio.clone(),
                image_size: cmd.image_size.clone(),
                ..Default::default()
            },
        )?;
        let gemini = is_gemini_image_model(&normalized.model);
        let negative_prompt = text_param(&cmd.negative_prompt).map(String::from);
        let sources: Vec<&str> = cmd
            .images
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if gemini && negative_prompt.is_some() {
            return Err(ToolError::Validation(format!(
                "negative_prompt is not supported by model {}. Describe what to avoid in the prompt instead",
                normalized.model
            )));
        }
        if !gemini && !sources.is_empty() {
            return Err(ToolError::Validation(format!(
                "images are not supported by model {}. Use a Gemini image model such as gemini-2.5-flash-image",
                normalized.model
            )));
        }
        if sources.len() > MAX_REFERENCE_IMAGES {
            return Err(ToolError::Validation(format!(
                "at most {MAX_REFERENCE_IMAGES} images can be passed, got {}",
                sources.len()
            )));
        }
        let mut reference_images = Vec::with_capacity(sources.len());
        for source in &sources {
            reference_images.push(reference_image(source).await?);
        }

        tracing::info!(
            tool = GENERATE_IMAGE,
            model = %normalized.model,
            count = normalized.count,
            references = reference_images.len(),
            "Starting image generation"
        );

        let model_name = normalized.model.clone();
        let request = GenerationRequest::Image(ImageRequest {
            prompt: prompt.to_string(),
            negative_prompt,
            reference_images,
            params: normalized,
        });
        let assets = generate(&self.ctx, request, &cancel, progress.as_ref()).await?;

        let prefix = if gemini { "gemini_image" } else { "imagen" };
        let results =
            deliver_all(&self.ctx, assets, &cmd.delivery, MediaDomain::Image, prefix).await?;
        let headline = format!("Generated {} image(s) with {model_name}.", results.len());
        Ok(ToolResult::success(result_blocks(headline, &results)))
    }
}

fn image_mime(source: &str) -> Option<&'static str> {
    let lower = source.to_ascii_lowercase();
    match lower.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        _ => None,
    }
}

/// Stored images are passed by URI; local ones are read and sent inline.
async fn reference_image(source: &str) -> Result<ReferenceImage, ToolError> {
    let mime_type = image_mime(source).ok_or_else(|| {
        ToolError::Validation(format!(
            "unsupported image '{source}'. Supported types are .png, .jpg, .jpeg and .webp"
        ))
    })?;
    if source.starts_with("gs://") {
        return Ok(ReferenceImage::Stored(ImageInput {
            uri: source.to_string(),
            mime_type: mime_type.to_string(),
        }));
    }
    let data = tokio::fs::read(source).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::Validation(format!("could not read image {source}: {e}"))
        } else {
            ToolError::Infrastructure(format!("could not read image {source}: {e}"))
        }
    })?;
    Ok(ReferenceImage::Inline {
        data: Bytes::from(data),
        mime_type: mime_type.to_string(),
    })
}
