//! Tool invocation wrapper: host seam, retry, call history

pub mod host;
pub mod invoker;

pub use host::ToolHost;
pub use invoker::{CallRecord, ToolInvoker};
