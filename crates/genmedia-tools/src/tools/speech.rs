//! `synthesize-speech` tool — Gemini TTS through Cloud Text-to-Speech.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use genmedia_backends::{AudioEncoding, GenerationRequest, ProgressSink, SpeechRequest};
use genmedia_delivery::Delivered;
use genmedia_registry::GenerationParams;
use genmedia_registry::voices::DEFAULT_VOICE;
use genmedia_types::{ContentBlock, MediaDomain, ToolError, ToolResult};

use crate::context::ToolContext;
use crate::params::{SpeechCommand, decode, text_param};
use crate::runner::{deliver_all, generate};
use crate::tools::{LIST_VOICES, SYNTHESIZE_SPEECH};
use crate::{Tool, ToolDefinition};

pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-tts";
pub const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_FILENAME_PREFIX: &str = "gemini_tts_audio";

pub struct SynthesizeSpeechTool {
    ctx: Arc<ToolContext>,
    definition: ToolDefinition,
}

impl SynthesizeSpeechTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let encodings: Vec<&str> = AudioEncoding::ALL.iter().map(|e| e.as_str()).collect();
        let definition = ToolDefinition {
            name: SYNTHESIZE_SPEECH.to_string(),
            description: "Synthesize speech from text with a Gemini TTS voice. Audio is returned inline unless an output directory or storage location is given.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "Text to speak (at most 800 characters)."
                    },
                    "voice": {
                        "type": "string",
                        "default": DEFAULT_VOICE,
                        "description": format!("Voice name. Use '{LIST_VOICES}' to see what is available.")
                    },
                    "model": {
                        "type": "string",
                        "default": DEFAULT_SPEECH_MODEL,
                        "description": ctx.registry.describe(MediaDomain::Speech)
                    },
                    "language_code": {
                        "type": "string",
                        "default": DEFAULT_LANGUAGE,
                        "description": "BCP-47 code or language name, e.g. en-US or German."
                    },
                    "style_prompt": {
                        "type": "string",
                        "description": "How the text should be spoken, e.g. 'Say this cheerfully'."
                    },
                    "audio_encoding": {
                        "type": "string",
                        "enum": encodings,
                        "default": "LINEAR16"
                    },
                    "output_filename_prefix": {
                        "type": "string",
                        "default": DEFAULT_FILENAME_PREFIX
                    },
                    "storage_locator": {
                        "type": "string",
                        "description": "Bucket or gs://bucket/prefix to upload audio to."
                    },
                    "output_directory": {
                        "type": "string",
                        "description": "Local directory to save audio into."
                    },
                    "output": {
                        "type": "string",
                        "enum": ["local-file", "inline", "object-storage"]
                    }
                },
                "required": ["text"]
            }),
        };
        Self { ctx, definition }
    }

    /// A BCP-47 code for `raw`, which may be a code or a language name.
    ///
    /// Codes missing from the table but shaped like `xx-YY` are passed through.
    fn language_code(&self, raw: Option<&str>) -> Result<String, ToolError> {
        let Some(raw) = raw else {
            return Ok(DEFAULT_LANGUAGE.to_string());
        };
        match self.ctx.registry.languages().resolve(raw) {
            Ok(found) => Ok(found.code),
            Err(_) if raw.contains('-') && !raw.contains(' ') => Ok(raw.to_string()),
            Err(e) => Err(e.into()),
        }
    }
}

fn delivery_message(delivered: &Delivered) -> String {
    match delivered {
        Delivered::Inline { .. } => "Audio data is included in the response.".to_string(),
        Delivered::LocalFile {
            path, size_bytes, ..
        } => format!("Audio saved to: {} ({size_bytes} bytes).", path.display()),
        other => format!("{}.", other.summary()),
    }
}

#[async_trait]
impl Tool for SynthesizeSpeechTool {
    fn name(&self) -> &str {
        SYNTHESIZE_SPEECH
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
        let cmd: SpeechCommand = decode(SYNTHESIZE_SPEECH, params)?;
        let text = cmd.text.trim();
        if text.is_empty() {
            return Err(ToolError::Validation(
                "text parameter must be a non-empty string and is required".into(),
            ));
        }

        let model_input = text_param(&cmd.model).unwrap_or(DEFAULT_SPEECH_MODEL);
        let model = self.ctx.registry.resolve_in(MediaDomain::Speech, model_input)?;
        let normalized = self.ctx.registry.validate(
            &model.canonical_name,
            &GenerationParams {
                text_chars: Some(text.chars().count()),
                ..Default::default()
            },
        )?;

        let voice_input = text_param(&cmd.voice).unwrap_or(DEFAULT_VOICE);
        let voice = self.ctx.registry.voices().find(voice_input).ok_or_else(|| {
            ToolError::Validation(format!(
                "invalid voice '{voice_input}'. Use '{LIST_VOICES}' to see available voices"
            ))
        })?;
        let language_code = self.language_code(text_param(&cmd.language_code))?;
        if !voice.speaks(&language_code) {
            return Err(ToolError::Validation(format!(
                "voice '{}' does not support language '{language_code}'. Supported: {}",
                voice.name,
                voice.language_codes.join(", ")
            )));
        }

        let encoding: AudioEncoding = match text_param(&cmd.audio_encoding) {
            Some(raw) => raw.parse().map_err(ToolError::Validation)?,
            None => AudioEncoding::default(),
        };

        let voice_name = voice.name.clone();
        tracing::info!(
            tool = SYNTHESIZE_SPEECH,
            model = %normalized.model,
            voice = %voice_name,
            language = %language_code,
            encoding = encoding.as_str(),
            chars = text.chars().count(),
            "Starting speech synthesis"
        );
        let request = GenerationRequest::Speech(SpeechRequest {
            model: normalized.model,
            text: text.to_string(),
            style_prompt: text_param(&cmd.style_prompt).map(String::from),
            voice: voice_name.clone(),
            language_code,
            encoding,
        });
        let assets = generate(&self.ctx, request, &cancel, progress.as_ref()).await?;

        let prefix = format!(
            "{}-{voice_name}",
            text_param(&cmd.output_filename_prefix).unwrap_or(DEFAULT_FILENAME_PREFIX)
        );
        let results =
            deliver_all(&self.ctx, assets, &cmd.delivery, MediaDomain::Speech, &prefix).await?;
        let Some(first) = results.first() else {
            return Err(ToolError::BackendOperation(
                "speech backend returned no audio".into(),
            ));
        };

        let mut content = vec![ContentBlock::text(format!(
            "Speech synthesized successfully with voice {voice_name}. {}",
            delivery_message(&first.delivered)
        ))];
        if let Delivered::Inline { .. } = &first.delivered {
            content.push(first.delivered.content_block());
        }
        content.extend(
            first
                .warnings
                .iter()
                .map(|w| ContentBlock::text(format!("Warning: {w}"))),
        );
        Ok(ToolResult::success(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genmedia_backends::BackendSet;
    use genmedia_types::GeneratedAsset;

    use crate::testing::{FakeBackend, context};

    fn speech_tool() -> (SynthesizeSpeechTool, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::ready(
            MediaDomain::Speech,
            vec![GeneratedAsset::from_bytes(b"RIFFdata".to_vec(), "audio/wav")],
        ));
        let ctx = Arc::new(context(BackendSet::new().with(backend.clone())));
        (SynthesizeSpeechTool::new(ctx), backend)
    }

    #[tokio::test]
    async fn test_inline_speech() {
        let (tool, backend) = speech_tool();
        let result = tool
            .execute(
                json!({"text": "hello world", "voice": "Kore"}),
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.content.len(), 2);
        assert_eq!(
            result.content[0].as_text(),
            Some("Speech synthesized successfully with voice Kore. Audio data is included in the response.")
        );
        assert!(matches!(&result.content[1], ContentBlock::Binary { mime_type, .. } if mime_type == "audio/wav"));

        let Some(GenerationRequest::Speech(req)) = backend.last_request() else {
            panic!("expected speech request");
        };
        assert_eq!(req.language_code, "en-US");
        assert_eq!(req.model, DEFAULT_SPEECH_MODEL);
        assert_eq!(req.encoding, AudioEncoding::Linear16);
    }

    #[tokio::test]
    async fn test_language_name_resolved() {
        let (tool, backend) = speech_tool();
        tool.execute(
            json!({"text": "hallo", "language_code": "German (Germany)"}),
            CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
        let Some(GenerationRequest::Speech(req)) = backend.last_request() else {
            panic!("expected speech request");
        };
        assert_eq!(req.language_code, "de-DE");
        assert_eq!(req.voice, DEFAULT_VOICE);
    }

    #[tokio::test]
    async fn test_text_too_long() {
        let (tool, backend) = speech_tool();
        let err = tool
            .execute(json!({"text": "a".repeat(801)}), CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(backend.submissions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_voice_and_encoding() {
        let (tool, backend) = speech_tool();
        let err = tool
            .execute(json!({"text": "hi", "voice": "Nobody"}), CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid voice 'Nobody'"));

        let err = tool
            .execute(
                json!({"text": "hi", "audio_encoding": "FLAC"}),
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported audio_encoding"));
        assert_eq!(backend.submissions(), 0);
    }

    #[tokio::test]
    async fn test_saved_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (tool, _) = speech_tool();
        let result = tool
            .execute(
                json!({"text": "hi", "output_directory": dir.path().to_str().unwrap(), "output_filename_prefix": "greeting"}),
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.content.len(), 1);
        assert!(result.text().contains("Audio saved to:"));
        let name = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name();
        assert!(name.to_str().unwrap().starts_with("greeting-Callirrhoe-"));
    }

    #[tokio::test]
    async fn test_unknown_output_rejected_before_submit() {
        let (tool, backend) = speech_tool();
        let err = tool
            .execute(
                json!({"text": "hello", "output": "carrier-pigeon"}),
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(backend.submissions(), 0);
    }
}
