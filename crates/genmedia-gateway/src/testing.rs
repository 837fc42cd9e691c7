//! Fixtures for gateway tests.

use std::sync::Arc;

use genmedia_backends::BackendSet;
use genmedia_delivery::OutputMaterializer;
use genmedia_registry::CapabilityRegistry;
use genmedia_tools::{ToolContext, default_tools};

use crate::dispatcher::ToolDispatcher;
use crate::handlers::McpServer;

/// A server with the built-in catalog and no backends wired in.
pub fn server() -> McpServer {
    let registry = Arc::new(CapabilityRegistry::builtin().unwrap());
    let ctx = ToolContext::new(
        registry.clone(),
        BackendSet::new(),
        Arc::new(OutputMaterializer::local_only()),
    );
    let dispatcher = ToolDispatcher::new(default_tools(Arc::new(ctx)));
    McpServer::new(Arc::new(dispatcher), registry)
}
