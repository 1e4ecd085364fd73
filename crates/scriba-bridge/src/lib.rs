//! Scriba UI Bridge
//!
//! This crate lets an asynchronous backend agent drive a live report-editor
//! UI over a persistent bidirectional channel: named rooms with per-session
//! monotonic sequencing, a closed vocabulary of validated UI actions with a
//! payload-size budget, tool invocation with retry and cancellation
//! bookkeeping, and agent bindings with lifecycle notifications and an
//! idle-session sweep.

pub mod actions;
pub mod agent;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod tools;

// Re-export commonly used types
pub use actions::{SequencedAction, ToastLevel, UiAction};
pub use agent::{AgentBindings, AgentReply, AgentRuntime, AgentToolCall, BoundAgent, SweeperHandle};
pub use bridge::{ContextPatch, ToolOutcome, TranslationContext, UiBridge};
pub use channel::{ChannelManager, ChannelTransport, ClientMessage, LocalTransport, ServerEvent};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use telemetry::{BridgeMetrics, MetricsSnapshot};
pub use tools::{CallRecord, ToolHost, ToolInvoker};
