//! `list-voices` tool — voice catalog lookup, optionally by language.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use genmedia_backends::ProgressSink;
use genmedia_types::{ContentBlock, ToolError, ToolResult};

use crate::context::ToolContext;
use crate::params::{VoicesCommand, decode, text_param};
use crate::tools::LIST_VOICES;
use crate::{Tool, ToolDefinition};

pub struct ListVoicesTool {
    ctx: Arc<ToolContext>,
    definition: ToolDefinition,
}

impl ListVoicesTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let definition = ToolDefinition {
            name: LIST_VOICES.to_string(),
            description: "List the available speech voices, optionally only those for one language. The language may be a descriptive name (e.g. 'German' or 'english (india)') or a BCP-47 code (e.g. 'de-DE').".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "language": {
                        "type": "string",
                        "description": "Language name or BCP-47 code to filter by."
                    }
                },
                "required": []
            }),
        };
        Self { ctx, definition }
    }
}

#[async_trait]
impl Tool for ListVoicesTool {
    fn name(&self) -> &str {
        LIST_VOICES
    }

    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: Value,
        _cancel: CancellationToken,
        _progress: Option<ProgressSink>,
    ) -> Result<ToolResult, ToolError> {
        let cmd: VoicesCommand = decode(LIST_VOICES, params)?;
        let catalog = self.ctx.registry.voices();

        let Some(query) = text_param(&cmd.language) else {
            let names = catalog.names();
            let listing = serde_json::to_string_pretty(&names)
                .map_err(|e| ToolError::Infrastructure(e.to_string()))?;
            return Ok(ToolResult::success(vec![
                ContentBlock::text(format!("Found {} available voices.", names.len())),
                ContentBlock::text(listing),
            ]));
        };

        let language = self.ctx.registry.languages().resolve(query)?;
        let voices: Vec<&str> = catalog
            .for_language(&language.code)
            .into_iter()
            .map(|v| v.name.as_str())
            .collect();
        tracing::debug!(query, code = %language.code, found = voices.len(), "Resolved voice language");

        if voices.is_empty() {
            return Ok(ToolResult::success(vec![ContentBlock::text(format!(
                "I've resolved your request for '{query}' to the language code '{}', but no voices are available for it.",
                language.code
            ))]));
        }
        Ok(ToolResult::success(vec![ContentBlock::text(format!(
            "I've resolved your request for '{query}' to the language code '{}'. Found {} voice(s): {}",
            language.code,
            voices.len(),
            voices.join(", ")
        ))]))
    }
}
