//! Tool host seam
//!
//! The host owns the actual tool implementations (MCP server, in-process
//! registry, HTTP facade). The invoker only needs name-based dispatch and a
//! lightweight liveness probe.

use crate::error::BridgeResult;
use async_trait::async_trait;
use serde_json::Value;

/// External capability provider, one callable per tool name
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Whether the host exposes a tool under this name
    fn has_tool(&self, tool: &str) -> bool;

    /// Invoke a tool with its parameters
    async fn call(&self, tool: &str, params: Value) -> BridgeResult<Value>;

    /// Liveness probe; hosts without a cheap no-op can leave the default
    async fn health(&self) -> BridgeResult<()> {
        Ok(())
    }
}
