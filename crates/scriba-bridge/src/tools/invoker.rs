//! Tool invocation with retry, call-history tracking, and UI forwarding
//!
//! Every invocation gets a call record that lives from dispatch until a
//! terminal outcome or cancellation. Retries back off exponentially
//! (`retry_delay * 2^(n-1)` before retry n) with the retry count threaded
//! through the record so diagnostics and tests see every attempt.
//! Cancellation is advisory: it forgets the record and stops future
//! retries, it does not abort a call already on the wire.

use crate::bridge::{ToolOutcome, UiBridge};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::telemetry::BridgeMetrics;
use crate::tools::host::ToolHost;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Bookkeeping for one in-flight or retrying invocation
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub call_id: String,
    pub tool: String,
    pub params: Value,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub retry_count: u32,
}

/// Wraps calls into a tool host with retry, metrics, and UI forwarding
pub struct ToolInvoker {
    host: Arc<dyn ToolHost>,
    bridge: Arc<UiBridge>,
    active: DashMap<String, CallRecord>,
    metrics: Arc<BridgeMetrics>,
    config: Arc<BridgeConfig>,
}

impl ToolInvoker {
    /// Create an invoker over a host, forwarding outcomes through a bridge
    pub fn new(
        host: Arc<dyn ToolHost>,
        bridge: Arc<UiBridge>,
        metrics: Arc<BridgeMetrics>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            host,
            bridge,
            active: DashMap::new(),
            metrics,
            config,
        }
    }

    /// Invoke a tool, retrying transient failures
    ///
    /// On success the result is surfaced to the session (raw result event,
    /// then translated actions) before it is returned. A missing tool is
    /// terminal and never retried. After the retry budget is exhausted the
    /// last error is surfaced to the UI as an error toast and re-raised.
    pub async fn invoke(
        &self,
        tool: &str,
        params: Value,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> BridgeResult<Value> {
        if !self.host.has_tool(tool) {
            return Err(BridgeError::tool_not_found(tool));
        }

        let call_id = Self::next_call_id();
        self.active.insert(
            call_id.clone(),
            CallRecord {
                call_id: call_id.clone(),
                tool: tool.to_string(),
                params: params.clone(),
                session_id: session_id.map(str::to_string),
                user_id: user_id.map(str::to_string),
                started_at: Utc::now(),
                retry_count: 0,
            },
        );
        let started = Instant::now();

        loop {
            match self.host.call(tool, params.clone()).await {
                Ok(result) => {
                    self.active.remove(&call_id);
                    self.metrics.record_tool_call(tool, started.elapsed(), true);
                    if let Some(session_id) = session_id {
                        self.forward_success(session_id, tool, &result).await;
                    }
                    return Ok(result);
                }

                Err(e @ BridgeError::ToolNotFound(_)) => {
                    self.active.remove(&call_id);
                    self.metrics.record_tool_call(tool, started.elapsed(), false);
                    return Err(e);
                }

                Err(e) => {
                    // Scope: guard must drop before the backoff await
                    let retry = {
                        match self.active.get_mut(&call_id) {
                            None => return Err(BridgeError::Cancelled),
                            Some(mut record) if record.retry_count < self.config.max_retries => {
                                record.retry_count += 1;
                                Some(record.retry_count)
                            }
                            Some(_) => None,
                        }
                    };

                    let Some(retry) = retry else {
                        self.active.remove(&call_id);
                        self.metrics.record_tool_call(tool, started.elapsed(), false);
                        error!(tool, error = %e, "tool invocation failed, retries exhausted");
                        if let Some(session_id) = session_id {
                            self.forward_failure(session_id, tool, &e).await;
                        }
                        return Err(e);
                    };

                    self.metrics.record_tool_failure();
                    self.metrics.record_tool_retry();
                    let delay = self.config.retry_delay * 2u32.pow(retry - 1);
                    debug!(tool, retry, ?delay, "tool invocation failed, backing off");
                    sleep(delay).await;

                    if !self.active.contains_key(&call_id) {
                        return Err(BridgeError::Cancelled);
                    }
                }
            }
        }
    }

    /// Forget a call record, preventing further retries
    ///
    /// Returns false when the record already reached a terminal outcome. A
    /// network call dispatched before cancellation is not aborted.
    pub fn cancel(&self, call_id: &str) -> bool {
        self.active.remove(call_id).is_some()
    }

    /// Snapshot of in-flight and retrying calls
    pub fn list_active(&self) -> Vec<CallRecord> {
        self.active.iter().map(|e| e.value().clone()).collect()
    }

    /// Probe the tool host; never throws
    pub async fn health_check(&self) -> bool {
        match self.host.health().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "tool host health check failed");
                false
            }
        }
    }

    async fn forward_success(&self, session_id: &str, tool: &str, result: &Value) {
        let outcome = ToolOutcome::success(tool, result.clone());
        let notify = async {
            self.bridge
                .emit_tool_result(session_id, tool, result.clone())
                .await;
            self.bridge.translate_and_emit(session_id, &outcome, None).await;
        };
        if timeout(self.config.notify_timeout, notify).await.is_err() {
            warn!(session_id, tool, "UI notification timed out after tool success");
        }
    }

    async fn forward_failure(&self, session_id: &str, tool: &str, error: &BridgeError) {
        let outcome = ToolOutcome::failure(tool, error.to_string());
        let notify = self.bridge.translate_and_emit(session_id, &outcome, None);
        if timeout(self.config.notify_timeout, notify).await.is_err() {
            warn!(session_id, tool, "UI notification timed out after tool failure");
        }
    }

    /// Timestamp plus random suffix; every invocation is independent, even
    /// for identical concurrent calls
    fn next_call_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
    }
}
