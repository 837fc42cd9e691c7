//! Tool Dispatcher: name → tool lookup with a fault boundary around execution.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use genmedia_backends::ProgressSink;
use genmedia_tools::{Tool, ToolDefinition};
use genmedia_types::{ToolError, ToolInvocation, ToolResult};

pub struct ToolDispatcher {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    /// Registration order, used for listing.
    order: Vec<String>,
}

impl ToolDispatcher {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut map = BTreeMap::new();
        let mut order = Vec::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name().to_string();
            if map.insert(name.clone(), tool).is_some() {
                warn!(tool = %name, "Duplicate tool registration, keeping the last one");
            } else {
                order.push(name);
            }
        }
        Self { tools: map, order }
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one invocation to a result.
    ///
    /// Never fails: unknown tools, tool errors and panics inside a tool all come
    /// back as an error [`ToolResult`] with a text block.
    pub async fn dispatch(
        &self,
        invocation: ToolInvocation,
        cancel: CancellationToken,
        progress: Option<ProgressSink>,
    ) -> ToolResult {
        let name = invocation.operation;
        let Some(tool) = self.tools.get(&name).cloned() else {
            warn!(tool = %name, "Unknown tool requested");
            return ToolError::UnknownTool {
                name,
                known: self.names(),
            }
            .into_tool_result();
        };

        let started = tokio::time::Instant::now();
        let outcome = AssertUnwindSafe(tool.execute(invocation.parameters, cancel, progress))
            .catch_unwind()
            .await;
        let elapsed_secs = started.elapsed().as_secs_f64();

        match outcome {
            Ok(Ok(result)) => {
                info!(tool = %name, elapsed_secs, "Tool call finished");
                result
            }
            Ok(Err(e)) => {
                match &e {
                    ToolError::Validation(_) | ToolError::UnknownModel { .. } => {
                        info!(tool = %name, kind = e.kind(), "Tool call rejected: {e}")
                    }
                    _ => error!(tool = %name, kind = e.kind(), elapsed_secs, "Tool call failed: {e}"),
                }
                e.into_tool_result()
            }
            Err(_) => {
                error!(tool = %name, elapsed_secs, "Tool panicked");
                ToolError::Infrastructure(format!("internal error while running {name}"))
                    .into_tool_result()
            }
        }
    }
}
