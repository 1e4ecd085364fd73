//! Action validation, payload budget, and emission
//!
//! The bridge sits between producers of actions (translator, agent binding,
//! direct callers) and the channel manager. It owns the validation whitelist,
//! the serialized payload ceiling, the per-session translation contexts, and
//! the emission metrics. All failure modes toward callers are `false`
//! returns; nothing here throws for a user-facing channel problem.

use crate::actions::UiAction;
use crate::bridge::context::{ContextPatch, TranslationContext};
use crate::bridge::translator::{ResultTranslator, ToolOutcome};
use crate::channel::ChannelManager;
use crate::config::BridgeConfig;
use crate::telemetry::BridgeMetrics;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Validates, sizes, sequences, and emits UI actions for live sessions
pub struct UiBridge {
    channel: Arc<ChannelManager>,
    translator: ResultTranslator,
    contexts: DashMap<String, TranslationContext>,
    metrics: Arc<BridgeMetrics>,
    config: Arc<BridgeConfig>,
}

impl UiBridge {
    /// Create a bridge over a channel manager
    pub fn new(
        channel: Arc<ChannelManager>,
        metrics: Arc<BridgeMetrics>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            channel,
            translator: ResultTranslator::new(),
            contexts: DashMap::new(),
            metrics,
            config,
        }
    }

    /// The channel manager underneath this bridge
    pub fn channel(&self) -> &Arc<ChannelManager> {
        &self.channel
    }

    /// The shared metrics accumulator
    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Surface a raw tool result to a session
    ///
    /// Rejects results whose serialized size exceeds the configured ceiling.
    /// Emission latency is recorded per tool name.
    pub async fn emit_tool_result(&self, session_id: &str, tool: &str, result: Value) -> bool {
        if !self.config.enable_ui_bridge {
            return false;
        }

        match serde_json::to_vec(&result) {
            Ok(bytes) if bytes.len() > self.config.max_payload_size => {
                self.metrics.record_oversized();
                if self.config.enable_logging {
                    warn!(
                        session_id,
                        tool,
                        size = bytes.len(),
                        limit = self.config.max_payload_size,
                        "tool result exceeds payload ceiling, dropped"
                    );
                }
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                if self.config.enable_logging {
                    warn!(session_id, tool, error = %e, "tool result not serializable, dropped");
                }
                return false;
            }
        }

        let start = Instant::now();
        let delivered = self.channel.emit_tool_result(session_id, tool, result).await;
        if delivered {
            self.metrics.record_emit_latency(tool, start.elapsed());
        }
        delivered
    }

    /// Validate and emit a batch of typed actions
    ///
    /// Invalid entries are dropped individually; the whole call is rejected
    /// when the valid subset is empty or its serialized size exceeds the
    /// ceiling. Sequence numbers are only consumed by actions that survive.
    pub async fn emit_actions(&self, session_id: &str, actions: Vec<UiAction>) -> bool {
        if !self.config.enable_ui_bridge {
            return false;
        }

        let mut valid = Vec::with_capacity(actions.len());
        for action in actions {
            match action.validate() {
                Ok(()) => valid.push(action),
                Err(e) => {
                    self.metrics.record_drop(action.kind());
                    if self.config.enable_logging {
                        warn!(session_id, kind = action.kind(), error = %e, "action dropped");
                    }
                }
            }
        }

        if valid.is_empty() {
            self.metrics.record_batch_rejected();
            if self.config.enable_logging {
                warn!(session_id, "action batch rejected: no valid actions");
            }
            return false;
        }

        match serde_json::to_vec(&valid) {
            Ok(bytes) if bytes.len() > self.config.max_payload_size => {
                self.metrics.record_oversized();
                self.metrics.record_batch_rejected();
                if self.config.enable_logging {
                    warn!(
                        session_id,
                        size = bytes.len(),
                        limit = self.config.max_payload_size,
                        "action batch exceeds payload ceiling, rejected"
                    );
                }
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                self.metrics.record_batch_rejected();
                if self.config.enable_logging {
                    warn!(session_id, error = %e, "action batch not serializable, rejected");
                }
                return false;
            }
        }

        let count = valid.len() as u64;
        let delivered = self.channel.emit(session_id, valid).await;
        if delivered {
            self.metrics.record_emitted(count);
        }
        delivered
    }

    /// Decode and emit raw JSON actions from a direct caller
    ///
    /// Each element passes through the decode whitelist; malformed entries
    /// drop individually before the typed path applies.
    pub async fn emit_raw_actions(&self, session_id: &str, values: &[Value]) -> bool {
        if !self.config.enable_ui_bridge {
            return false;
        }

        let mut decoded = Vec::with_capacity(values.len());
        for value in values {
            match UiAction::from_value(value) {
                Ok(action) => decoded.push(action),
                Err(e) => {
                    let kind = value
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    self.metrics.record_drop(kind);
                    if self.config.enable_logging {
                        warn!(session_id, kind, error = %e, "raw action dropped");
                    }
                }
            }
        }

        if decoded.is_empty() {
            self.metrics.record_batch_rejected();
            if self.config.enable_logging {
                warn!(session_id, "raw action batch rejected: nothing decoded");
            }
            return false;
        }
        self.emit_actions(session_id, decoded).await
    }

    /// Translate a tool outcome through the session's context and emit
    ///
    /// Fetches or creates the session's [`TranslationContext`], applies the
    /// optional patch, translates, records the batch kinds back into the
    /// context, then delegates to [`UiBridge::emit_actions`]. An empty
    /// translation means nothing to emit and returns false.
    pub async fn translate_and_emit(
        &self,
        session_id: &str,
        outcome: &ToolOutcome,
        patch: Option<ContextPatch>,
    ) -> bool {
        if !self.config.enable_ui_bridge {
            return false;
        }

        // Scope: the map guard must not be held across the emission await.
        let actions = {
            let mut context = self
                .contexts
                .entry(session_id.to_string())
                .or_insert_with(|| TranslationContext::new(session_id));
            if let Some(patch) = patch {
                context.apply(patch);
            }

            let actions = self.translator.translate(outcome, &context);
            context.note_emitted(actions.iter().map(|a| a.kind().to_string()).collect());
            if outcome.success {
                if let Some(data) = outcome.result.get("data").and_then(Value::as_object) {
                    context.merge_form_data(data.clone());
                }
            }
            actions
        };

        if actions.is_empty() {
            debug!(session_id, tool = outcome.tool, "translation produced no actions");
            return false;
        }
        self.emit_actions(session_id, actions).await
    }

    /// Discard the translation context for a session
    pub fn drop_context(&self, session_id: &str) {
        self.contexts.remove(session_id);
    }

    /// Drop a session entirely: its translation context and channel record
    pub async fn expire_session(&self, session_id: &str) {
        self.drop_context(session_id);
        self.channel.leave(session_id).await;
    }

    /// Snapshot of a session's translation context, if one exists
    pub fn context(&self, session_id: &str) -> Option<TranslationContext> {
        self.contexts.get(session_id).map(|c| c.clone())
    }
}
