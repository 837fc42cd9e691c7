//! genmedia-tools: the generative-media operations exposed by the gateway.
//!
//! Provides:
//! - The [`Tool`] trait and its JSON-schema [`ToolDefinition`]
//! - Typed per-operation commands decoded from raw parameters ([`params`])
//! - [`ToolContext`], the shared handles every tool works against
//! - The tools themselves: `generate-video`, `generate-image`,
//!   `synthesize-speech`, `list-voices` and `process-media`

pub mod context;
pub mod params;
pub mod runner;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use genmedia_backends::ProgressSink;
use genmedia_types::{ToolError, ToolResult};

pub use context::ToolContext;

/// Name, description and input schema advertised for a tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One invocable operation.
///
/// `execute` returns `Err` for every failure in the error taxonomy; the
/// dispatcher turns it into an error result, so tools just use `?`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> &ToolDefinition;

    async fn execute(
        &self,
        params: Value,
        cancel: CancellationToken,
        progress: Option<ProgressSink>,
    ) -> Result<ToolResult, ToolError>;
}

/// Every tool, wired to the same context.
pub fn default_tools(ctx: Arc<ToolContext>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(tools::video::GenerateVideoTool::new(ctx.clone())),
        Arc::new(tools::image::GenerateImageTool::new(ctx.clone())),
        Arc::new(tools::speech::SynthesizeSpeechTool::new(ctx.clone())),
        Arc::new(tools::voices::ListVoicesTool::new(ctx.clone())),
        Arc::new(tools::process::ProcessMediaTool::new(ctx)),
    ]
}
