//! `process-media` tool — post-process existing files with the external transform step.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use genmedia_backends::{
    BackendError, ProgressSink, TransformInput, TransformOp, describe_count,
};
use genmedia_storage::{ObjectLocation, StorageError};
use genmedia_types::{ContentBlock, MediaDomain, ToolError, ToolResult};

use crate::context::ToolContext;
use crate::params::{ProcessCommand, decode, text_param};
use crate::runner::{deliver_all, result_blocks};
use crate::tools::PROCESS_MEDIA;
use crate::{Tool, ToolDefinition};

const GET_MEDIA_INFO: &str = "get-media-info";

const OPERATIONS: &[&str] = &[
    "convert-audio",
    "adjust-volume",
    "create-gif",
    "combine-audio-video",
    "overlay-image",
    "concatenate",
    "layer-audio",
    GET_MEDIA_INFO,
];
const AUDIO_FORMATS: &[&str] = &["mp3", "wav"];
const CONCAT_FORMATS: &[&str] = &["mp4", "mp3", "wav"];

pub struct ProcessMediaTool {
    ctx: Arc<ToolContext>,
    definition: ToolDefinition,
}

impl ProcessMediaTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let definition = ToolDefinition {
            name: PROCESS_MEDIA.to_string(),
            description: "Post-process local or Cloud Storage media files: convert audio between mp3 and wav, adjust volume, turn a video into an animated GIF, put an audio track on a video, overlay an image on a video, join clips end to end, mix audio tracks, or report a file's streams and format.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Local file path or gs:// URI, for operations that take one file."
                    },
                    "inputs": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Ordered files for operations that take several: combine-audio-video (video, audio), overlay-image (video, image), concatenate and layer-audio (2 or more)."
                    },
                    "operation": {
                        "type": "string",
                        "enum": OPERATIONS
                    },
                    "format": {
                        "type": "string",
                        "enum": CONCAT_FORMATS,
                        "description": "Output format. mp3 or wav for audio operations (default mp3); concatenate also accepts mp4 and defaults to the first input's type."
                    },
                    "gain_db": {
                        "type": "number",
                        "description": "Volume change in decibels for adjust-volume, e.g. -3 or 6."
                    },
                    "fps": {
                        "type": "integer",
                        "description": "Frames per second for create-gif (default 10)."
                    },
                    "width": {
                        "type": "integer",
                        "description": "GIF width in pixels for create-gif (default 480)."
                    },
                    "x": {
                        "type": "integer",
                        "description": "Overlay offset from the left edge in pixels (default 0)."
                    },
                    "y": {
                        "type": "integer",
                        "description": "Overlay offset from the top edge in pixels (default 0)."
                    },
                    "output_filename_prefix": { "type": "string" },
                    "storage_locator": { "type": "string" },
                    "output_directory": { "type": "string" },
                    "output": {
                        "type": "string",
                        "enum": ["local-file", "inline", "object-storage"]
                    }
                },
                "required": ["operation"]
            }),
        };
        Self { ctx, definition }
    }

    async fn read_input(&self, input: &str) -> Result<TransformInput, ToolError> {
        let data = if input.starts_with("gs://") {
            let location = ObjectLocation::parse(input)
                .map_err(|e| ToolError::Validation(e.to_string()))?;
            let store = self.ctx.store.as_ref().ok_or_else(|| {
                ToolError::Validation(format!(
                    "cannot read {input}: no object storage is configured"
                ))
            })?;
            store.download(&location).await.map_err(|e| match e {
                StorageError::NotFound(_) | StorageError::InvalidLocator(_) => {
                    ToolError::Validation(format!("could not read input {input}: {e}"))
                }
                other => ToolError::Infrastructure(format!(
                    "could not download input {input}: {other}"
                )),
            })?
        } else {
            tokio::fs::read(input).await.map(Bytes::from).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ToolError::Validation(format!("could not read input {input}: {e}"))
                } else {
                    ToolError::Infrastructure(format!("could not read input {input}: {e}"))
                }
            })?
        };
        Ok(TransformInput::new(data, extension_of(input)))
    }

    async fn read_inputs(&self, inputs: &[&str]) -> Result<Vec<TransformInput>, ToolError> {
        let mut staged = Vec::with_capacity(inputs.len());
        for input in inputs {
            staged.push(self.read_input(input).await?);
        }
        Ok(staged)
    }

    async fn media_info(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let staged = self.read_input(input).await?;
        let info = self
            .ctx
            .transform
            .media_info(staged, cancel)
            .await
            .map_err(|e| transform_error(e, GET_MEDIA_INFO, cancel))?;
        let pretty = serde_json::to_string_pretty(&info)
            .map_err(|e| ToolError::Infrastructure(e.to_string()))?;
        Ok(ToolResult::success(vec![
            ContentBlock::text(format!("Media info for {input}:")),
            ContentBlock::text(pretty),
        ]))
    }
}

/// Lowercased file extension of a path or locator, `bin` when there is none.
fn extension_of(input: &str) -> String {
    let name = input.rsplit('/').next().unwrap_or(input);
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "bin".to_string(),
    }
}

fn transform_error(e: BackendError, operation: &str, cancel: &CancellationToken) -> ToolError {
    if cancel.is_cancelled() {
        ToolError::Canceled {
            operation: operation.to_string(),
        }
    } else {
        ToolError::BackendOperation(e.to_string())
    }
}

fn pick_format(cmd: &ProcessCommand, allowed: &[&str], default: &str) -> Result<String, ToolError> {
    let format = text_param(&cmd.format).unwrap_or(default).to_ascii_lowercase();
    if allowed.contains(&format.as_str()) {
        Ok(format)
    } else {
        Err(ToolError::Validation(format!(
            "unsupported format '{format}'. Supported formats: {}",
            allowed.join(", ")
        )))
    }
}

/// Turn the command's operation fields into a [`TransformOp`].
fn transform_op(cmd: &ProcessCommand, inputs: &[&str]) -> Result<TransformOp, ToolError> {
    let audio_format = || pick_format(cmd, AUDIO_FORMATS, "mp3");

    match cmd.operation.trim() {
        "convert-audio" => Ok(TransformOp::ConvertAudio {
            format: audio_format()?,
        }),
        "adjust-volume" => {
            let gain_db = cmd.gain_db.ok_or_else(|| {
                ToolError::Validation("gain_db is required for adjust-volume".into())
            })?;
            if !gain_db.is_finite() || gain_db.abs() > 60.0 {
                return Err(ToolError::Validation(format!(
                    "gain_db must be between -60 and 60, got {gain_db}"
                )));
            }
            Ok(TransformOp::AdjustVolume {
                gain_db,
                format: audio_format()?,
            })
        }
        "create-gif" => {
            let fps = cmd.fps.unwrap_or(10);
            let width = cmd.width.unwrap_or(480);
            if !(1..=50).contains(&fps) {
                return Err(ToolError::Validation(format!(
                    "fps must be between 1 and 50, got {fps}"
                )));
            }
            if !(16..=4096).contains(&width) {
                return Err(ToolError::Validation(format!(
                    "width must be between 16 and 4096, got {width}"
                )));
            }
            Ok(TransformOp::CreateGif {
                fps: fps as u32,
                width: width as u32,
            })
        }
        "combine-audio-video" => Ok(TransformOp::CombineAudioVideo),
        "overlay-image" => {
            let x = cmd.x.unwrap_or(0);
            let y = cmd.y.unwrap_or(0);
            for (axis, value) in [("x", x), ("y", y)] {
                if !(0..=8192).contains(&value) {
                    return Err(ToolError::Validation(format!(
                        "{axis} must be between 0 and 8192, got {value}"
                    )));
                }
            }
            Ok(TransformOp::OverlayImage {
                x: x as u32,
                y: y as u32,
            })
        }
        "concatenate" => {
            let default = match inputs.first().map(|i| extension_of(i)).as_deref() {
                Some("mp4" | "mov" | "webm") => "mp4",
                Some("wav") => "wav",
                _ => "mp3",
            };
            Ok(TransformOp::Concatenate {
                format: pick_format(cmd, CONCAT_FORMATS, default)?,
            })
        }
        "layer-audio" => Ok(TransformOp::LayerAudio {
            format: audio_format()?,
        }),
        other => Err(ToolError::Validation(format!(
            "unknown operation '{other}'. Supported operations: {}",
            OPERATIONS.join(", ")
        ))),
    }
}

#[async_trait]
impl Tool for ProcessMediaTool {
    fn name(&self) -> &str {
        PROCESS_MEDIA
    }

    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        cancel: CancellationToken,
        _progress: Option<ProgressSink>,
    ) -> Result<ToolResult, ToolError> {
        let cmd: ProcessCommand = decode(PROCESS_MEDIA, params)?;
        let inputs = cmd.all_inputs();

        if cmd.operation.trim() == GET_MEDIA_INFO {
            return match inputs.as_slice() {
                [input] => self.media_info(input, &cancel).await,
                _ => Err(ToolError::Validation(format!(
                    "{GET_MEDIA_INFO} takes 1 input, got {}",
                    inputs.len()
                ))),
            };
        }

        let op = transform_op(&cmd, &inputs)?;
        let expected = op.expected_inputs();
        if !expected.contains(&inputs.len()) {
            return Err(ToolError::Validation(format!(
                "{} takes {} input(s), got {}. Pass a path or gs:// URI in input, or an ordered list in inputs",
                op.name(),
                describe_count(&expected),
                inputs.len()
            )));
        }

        let staged = self.read_inputs(&inputs).await?;
        tracing::info!(
            tool = PROCESS_MEDIA,
            op = op.name(),
            inputs = ?inputs,
            bytes = staged.iter().map(|i| i.data.len()).sum::<usize>(),
            "Processing media"
        );

        let asset = self
            .ctx
            .transform
            .apply(staged, &op, &cancel)
            .await
            .map_err(|e| transform_error(e, op.name(), &cancel))?;

        let prefix = text_param(&cmd.output_filename_prefix).unwrap_or(op.name());
        let results = deliver_all(
            &self.ctx,
            vec![asset],
            &cmd.delivery,
            MediaDomain::Transform,
            prefix,
        )
        .await?;
        let headline = format!("{} finished for {}.", op.name(), inputs.join(", "));
        Ok(ToolResult::success(result_blocks(headline, &results)))
    }
}
