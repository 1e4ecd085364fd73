//! Error types for the Scriba UI bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Main error type for the bridge subsystem
///
/// Errors that reflect a problem with the user-facing channel (unknown
/// sessions, dropped actions, oversized payloads) are absorbed at the call
/// site and reported through `false` returns and metrics; only errors that
/// reflect a problem with the underlying operation surface through this type.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// The tool host has no member for the requested tool. Never retried.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// Tool invocation failed (network or runtime failure)
    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    /// The call record was cancelled between attempts
    #[error("Tool call was cancelled")]
    Cancelled,

    /// Agent run errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Channel transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// An action failed structural or semantic validation
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Create a new tool error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a tool-not-found error
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound(tool.into())
    }

    /// Create a new agent error
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent(message.into())
    }

    /// Create a new transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new invalid-action error
    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::InvalidAction(message.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<anyhow::Error> for BridgeError {
    fn from(error: anyhow::Error) -> Self {
        Self::Agent(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_found_message() {
        let err = BridgeError::tool_not_found("render_report_pdf");
        assert_eq!(err.to_string(), "Tool 'render_report_pdf' not found");
    }

    #[test]
    fn test_tool_error_embeds_name_and_message() {
        let err = BridgeError::tool("lookup_law", "connection reset");
        assert_eq!(err.to_string(), "Tool error: lookup_law: connection reset");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BridgeError = parse_err.into();
        assert!(matches!(err, BridgeError::Json(_)));
    }
}
