//! Agent runtime seam
//!
//! The bridge does not run agents itself; it binds to anything that can take
//! a message and produce a reply, possibly having performed tool calls of
//! its own along the way.

use crate::error::BridgeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool call an agent performed during its turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolCall {
    pub tool: String,
    pub result: Value,
}

/// The result of one agent turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Free-text output, when the agent produced any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Tool calls embedded in the reply, for re-deriving UI actions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AgentToolCall>,
}

impl AgentReply {
    /// A reply that is only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// Anything that can run one conversational turn
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Run a turn for a message, with optional caller-supplied context
    async fn run(&self, message: &str, context: Option<&Value>) -> BridgeResult<AgentReply>;
}
