//! Channel transport seam and wire protocol types
//!
//! The transport owns the physical bidirectional channel (sockets, rooms);
//! the [`ChannelManager`](super::ChannelManager) owns sessions and
//! sequencing. [`LocalTransport`] is an in-process implementation backed by
//! per-room broadcast channels, suitable for embedded consumers and tests.

use crate::actions::SequencedAction;
use crate::error::BridgeResult;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Default per-room buffer for [`LocalTransport`]
const DEFAULT_ROOM_CAPACITY: usize = 256;

/// Inbound protocol messages from UI clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join (or re-join) a UI session
    #[serde(rename = "ui:join")]
    Join {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },

    /// Leave a UI session
    #[serde(rename = "ui:leave")]
    Leave {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Outbound events fanned out to a session's room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Join acknowledgement
    #[serde(rename = "ui:joined")]
    Joined {
        #[serde(rename = "sessionId")]
        session_id: String,
        room: String,
        /// Epoch milliseconds
        timestamp: i64,
    },

    /// A sequenced batch of UI actions
    #[serde(rename = "ui:actions")]
    Actions { actions: Vec<SequencedAction> },

    /// A raw tool result surfaced to the session
    #[serde(rename = "mcp:result")]
    ToolResult {
        tool: String,
        result: Value,
        /// Epoch milliseconds
        timestamp: i64,
        sequence: u64,
    },
}

/// The physical channel underneath the bridge
///
/// Implementations map `connection` handles to real sockets. All methods are
/// infallible for unknown rooms where the underlying medium allows it; errors
/// are reserved for genuine transport failures.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Subscribe a connection to a room
    async fn subscribe(&self, connection: &str, room: &str) -> BridgeResult<()>;

    /// Remove a connection from a room
    async fn unsubscribe(&self, connection: &str, room: &str) -> BridgeResult<()>;

    /// Deliver an event to every subscriber of a room
    async fn broadcast(&self, room: &str, event: ServerEvent) -> BridgeResult<()>;
}

/// In-process transport backed by per-room broadcast channels
///
/// Subscribers attach with [`LocalTransport::listen`]; a broadcast into a
/// room with no listeners is silently discarded, matching the best-effort
/// delivery contract.
#[derive(Debug)]
pub struct LocalTransport {
    rooms: DashMap<String, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl LocalTransport {
    /// Create a transport with the default room buffer
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ROOM_CAPACITY)
    }

    /// Create a transport with a custom per-room buffer
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Attach an in-process listener to a room
    ///
    /// The room channel is created on first use; events broadcast before the
    /// listener attached are not replayed.
    pub fn listen(&self, room: &str) -> broadcast::Receiver<ServerEvent> {
        self.room_sender(room).subscribe()
    }

    /// Number of live listeners on a room
    pub fn listener_count(&self, room: &str) -> usize {
        self.rooms
            .get(room)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    fn room_sender(&self, room: &str) -> broadcast::Sender<ServerEvent> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelTransport for LocalTransport {
    async fn subscribe(&self, _connection: &str, room: &str) -> BridgeResult<()> {
        // Connections are a no-op here: in-process consumers hold their own
        // receivers via listen(). Creating the room keeps join acks deliverable.
        self.room_sender(room);
        Ok(())
    }

    async fn unsubscribe(&self, _connection: &str, _room: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn broadcast(&self, room: &str, event: ServerEvent) -> BridgeResult<()> {
        if let Some(sender) = self.rooms.get(room) {
            // An Err here only means no live receivers
            let _ = sender.send(event);
        }
        Ok(())
    }
}
