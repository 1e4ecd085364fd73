//! Channel layer: transport seam, wire protocol, session manager

pub mod manager;
pub mod transport;

pub use manager::{ChannelManager, SessionInfo};
pub use transport::{ChannelTransport, ClientMessage, LocalTransport, ServerEvent};
