//! Error taxonomy surfaced to callers.

use thiserror::Error;

use crate::ToolResult;

/// Every way a tool invocation can fail.
///
/// Each variant renders to a single human-readable sentence; callers never
/// see anything but a text block.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    /// Bad or missing parameter, or a capability the model lacks.
    #[error("{0}")]
    Validation(String),

    /// The model name matched neither a canonical name nor an alias.
    #[error("model '{input}' is not a valid or supported {domain} model. Supported models: {}", .known.join(", "))]
    UnknownModel {
        input: String,
        domain: String,
        known: Vec<String>,
    },

    #[error("tool '{name}' not found. Available tools: {}", .known.join(", "))]
    UnknownTool { name: String, known: Vec<String> },

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Starting the remote job failed; text comes from the backend.
    #[error("failed to start generation: {0}")]
    BackendSubmission(String),

    /// The remote job finished in a failed state; text is the backend's own.
    #[error("generation failed: {0}")]
    BackendOperation(String),

    #[error(
        "timed out after {elapsed_secs}s waiting for operation {operation}; the remote job may still complete"
    )]
    Timeout { operation: String, elapsed_secs: u64 },

    #[error("request canceled before operation {operation} completed")]
    Canceled { operation: String },

    /// Delivery failed and no fallback could produce a result.
    #[error("delivery failed: {0}")]
    Infrastructure(String),
}

impl ToolError {
    /// Short stable identifier for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(_) => "validation",
            ToolError::UnknownModel { .. } => "unknown_model",
            ToolError::UnknownTool { .. } => "unknown_tool",
            ToolError::RateLimited => "rate_limited",
            ToolError::BackendSubmission(_) => "backend_submission",
            ToolError::BackendOperation(_) => "backend_operation",
            ToolError::Timeout { .. } => "timeout",
            ToolError::Canceled { .. } => "canceled",
            ToolError::Infrastructure(_) => "infrastructure",
        }
    }

    pub fn into_tool_result(self) -> ToolResult {
        ToolResult::error(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_lists_known() {
        let err = ToolError::UnknownModel {
            input: "veo-9".into(),
            domain: "video".into(),
            known: vec!["veo-2.0-generate-001".into(), "veo-3.0-generate-001".into()],
        };
        let text = err.to_string();
        assert!(text.contains("'veo-9'"));
        assert!(text.contains("veo-2.0-generate-001, veo-3.0-generate-001"));
    }

    #[test]
    fn test_backend_operation_keeps_message_verbatim() {
        let msg = "Video blocked by safety filters: code 3 (support code 58061214)";
        let result = ToolError::BackendOperation(msg.into()).into_tool_result();
        assert!(result.is_error);
        assert!(result.text().contains(msg));
    }

    #[test]
    fn test_timeout_distinct_from_failure() {
        let err = ToolError::Timeout {
            operation: "ops/1".into(),
            elapsed_secs: 300,
        };
        assert_eq!(err.kind(), "timeout");
        assert!(err.to_string().contains("300s"));
    }
}
