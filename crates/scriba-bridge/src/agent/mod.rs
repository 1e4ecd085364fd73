//! Agent binding: run lifecycle, session metadata, idle sweep

pub mod bindings;
pub mod runtime;

pub use bindings::{AgentBindings, AgentSessionInfo, BoundAgent, SweeperHandle};
pub use runtime::{AgentReply, AgentRuntime, AgentToolCall};
