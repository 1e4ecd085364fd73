//! Session registry, room fan-out, and per-session sequencing
//!
//! The manager knows nothing about tool semantics. It owns session records,
//! derives rooms deterministically from session ids, and stamps every
//! outbound batch with per-session monotonic sequence numbers. Emissions to
//! unknown sessions are logged no-ops, never errors.

use crate::actions::{SequencedAction, UiAction};
use crate::channel::transport::{ChannelTransport, ClientMessage, ServerEvent};
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// One live UI participant
#[derive(Debug)]
struct Session {
    session_id: String,
    user_id: Option<String>,
    room: String,
    connection: String,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    sequence: AtomicU64,
    /// Held across stamp-and-broadcast so concurrent emissions to the same
    /// session cannot interleave sequence assignment and delivery order.
    emit_gate: tokio::sync::Mutex<()>,
}

impl Session {
    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }
}

/// Diagnostic snapshot of one session record
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: Option<String>,
    pub room: String,
    pub connection: String,
    pub created_at: DateTime<Utc>,
    pub idle_for: std::time::Duration,
    pub sequence: u64,
}

/// Owns the channel side of the bridge: sessions, rooms, sequencing
pub struct ChannelManager {
    transport: Arc<dyn ChannelTransport>,
    sessions: DashMap<String, Arc<Session>>,
    config: Arc<BridgeConfig>,
}

impl ChannelManager {
    /// Create a manager over a transport
    pub fn new(transport: Arc<dyn ChannelTransport>, config: Arc<BridgeConfig>) -> Self {
        Self {
            transport,
            sessions: DashMap::new(),
            config,
        }
    }

    /// Deterministic room for a session id
    pub fn room_for(session_id: &str) -> String {
        format!("ui:{session_id}")
    }

    /// Create or reset a session record and subscribe its connection
    ///
    /// Idempotent per session id: re-joining replaces the record (fresh
    /// creation timestamp, sequence counter back to 0). Returns the room.
    pub async fn join(
        &self,
        session_id: &str,
        user_id: Option<String>,
        connection: &str,
    ) -> BridgeResult<String> {
        let room = Self::room_for(session_id);
        self.transport.subscribe(connection, &room).await?;

        let session = Arc::new(Session {
            session_id: session_id.to_string(),
            user_id,
            room: room.clone(),
            connection: connection.to_string(),
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            sequence: AtomicU64::new(0),
            emit_gate: tokio::sync::Mutex::new(()),
        });
        self.sessions.insert(session_id.to_string(), session);
        debug!(session_id, room, "ui session joined");

        let ack = ServerEvent::Joined {
            session_id: session_id.to_string(),
            room: room.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.transport.broadcast(&room, ack).await {
            if self.config.enable_logging {
                warn!(session_id, error = %e, "failed to deliver join ack");
            }
        }

        Ok(room)
    }

    /// Remove a session record and unsubscribe its connection
    pub async fn leave(&self, session_id: &str) {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return;
        };
        if let Err(e) = self
            .transport
            .unsubscribe(&session.connection, &session.room)
            .await
        {
            if self.config.enable_logging {
                warn!(session_id, error = %e, "unsubscribe failed during leave");
            }
        }
        debug!(session_id, "ui session left");
    }

    /// Leave every session whose subscription belongs to a disconnecting
    /// connection
    pub async fn on_disconnect(&self, connection: &str) {
        let affected: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| e.value().connection == connection)
            .map(|e| e.key().clone())
            .collect();
        for session_id in affected {
            self.leave(&session_id).await;
        }
    }

    /// Dispatch an inbound protocol message from a connection
    pub async fn handle_message(
        &self,
        connection: &str,
        message: ClientMessage,
    ) -> BridgeResult<()> {
        match message {
            ClientMessage::Join {
                session_id,
                user_id,
            } => {
                self.join(&session_id, user_id, connection).await?;
            }
            ClientMessage::Leave { session_id } => {
                self.leave(&session_id).await;
            }
        }
        Ok(())
    }

    /// Refresh a session's last-activity without emitting anything
    pub fn heartbeat(&self, session_id: &str) -> bool {
        match self.sessions.get(session_id) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Stamp and broadcast a batch of actions to a session's room
    ///
    /// Sequence numbers are assigned one per action, in array order, and the
    /// whole stamp-and-broadcast is atomic per session. Returns false (no-op)
    /// for unknown sessions or transport failure.
    pub async fn emit(&self, session_id: &str, actions: Vec<UiAction>) -> bool {
        let Some(session) = self.lookup(session_id) else {
            return false;
        };

        let _gate = session.emit_gate.lock().await;
        let now = Utc::now().timestamp_millis();
        let batch: Vec<SequencedAction> = actions
            .into_iter()
            .map(|action| SequencedAction {
                action,
                timestamp: now,
                sequence: session.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            })
            .collect();

        match self
            .transport
            .broadcast(&session.room, ServerEvent::Actions { actions: batch })
            .await
        {
            Ok(()) => {
                session.touch();
                true
            }
            Err(e) => {
                if self.config.enable_logging {
                    warn!(session_id, error = %e, "action broadcast failed");
                }
                false
            }
        }
    }

    /// Stamp and broadcast a raw tool result as its own event type
    pub async fn emit_tool_result(&self, session_id: &str, tool: &str, result: Value) -> bool {
        let Some(session) = self.lookup(session_id) else {
            return false;
        };

        let _gate = session.emit_gate.lock().await;
        let event = ServerEvent::ToolResult {
            tool: tool.to_string(),
            result,
            timestamp: Utc::now().timestamp_millis(),
            sequence: session.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };

        match self.transport.broadcast(&session.room, event).await {
            Ok(()) => {
                session.touch();
                true
            }
            Err(e) => {
                if self.config.enable_logging {
                    warn!(session_id, tool, error = %e, "tool result broadcast failed");
                }
                false
            }
        }
    }

    /// Whether a session is currently joined
    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Diagnostic snapshot of all live sessions
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|e| {
                let s = e.value();
                SessionInfo {
                    session_id: s.session_id.clone(),
                    user_id: s.user_id.clone(),
                    room: s.room.clone(),
                    connection: s.connection.clone(),
                    created_at: s.created_at,
                    idle_for: s.last_activity.lock().elapsed(),
                    sequence: s.sequence.load(Ordering::SeqCst),
                }
            })
            .collect()
    }

    fn lookup(&self, session_id: &str) -> Option<Arc<Session>> {
        match self.sessions.get(session_id) {
            Some(entry) => Some(entry.value().clone()),
            None => {
                if self.config.enable_logging {
                    warn!(session_id, "emit to unknown session ignored");
                }
                None
            }
        }
    }
}
