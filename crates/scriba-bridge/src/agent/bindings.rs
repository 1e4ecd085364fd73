//! Binding agents to UI sessions
//!
//! One binding ties an agent runtime to a tool invoker and a bridge. A run
//! notifies the session at start, surfaces whatever the reply carries
//! (embedded tool calls, long free text), and always closes with a toast.
//! UI notifications are best-effort with a bounded wait; they never turn a
//! successful run into a failure and never block cleanup.

use crate::actions::UiAction;
use crate::agent::runtime::{AgentReply, AgentRuntime};
use crate::bridge::{ToolOutcome, UiBridge};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::tools::ToolInvoker;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Free text longer than this is surfaced in its own panel
const LONG_TEXT_THRESHOLD: usize = 200;

/// Panel that displays an agent's long free-text output
const REPLY_PANEL: &str = "agent_reply";

/// Session metadata owned by a binding
#[derive(Debug)]
struct AgentSession {
    user_id: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
}

/// Diagnostic snapshot of one bound session
#[derive(Debug, Clone)]
pub struct AgentSessionInfo {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub idle_for: Duration,
}

/// One registered (agent, invoker, bridge) tuple with its session map
pub struct BoundAgent {
    agent_id: String,
    runtime: Arc<dyn AgentRuntime>,
    invoker: Arc<ToolInvoker>,
    bridge: Arc<UiBridge>,
    sessions: DashMap<String, AgentSession>,
}

impl BoundAgent {
    /// The binding's agent id
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The invoker bound to this agent
    pub fn invoker(&self) -> &Arc<ToolInvoker> {
        &self.invoker
    }

    /// Number of sessions this binding currently tracks
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the binding tracks a session
    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Diagnostic snapshot of this binding's sessions
    pub fn sessions(&self) -> Vec<AgentSessionInfo> {
        self.sessions
            .iter()
            .map(|e| AgentSessionInfo {
                session_id: e.key().clone(),
                user_id: e.value().user_id.clone(),
                created_at: e.value().created_at,
                idle_for: e.value().last_activity.lock().elapsed(),
            })
            .collect()
    }

    /// Create the session record on first sight, refresh activity always
    fn touch_session(&self, session_id: &str, user_id: Option<&str>) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            *session.last_activity.lock() = Instant::now();
            if session.user_id.is_none() {
                session.user_id = user_id.map(str::to_string);
            }
            return;
        }
        self.sessions.insert(
            session_id.to_string(),
            AgentSession {
                user_id: user_id.map(str::to_string),
                created_at: Utc::now(),
                last_activity: Mutex::new(Instant::now()),
            },
        );
    }
}

/// Registry of agent bindings plus the idle sweep
pub struct AgentBindings {
    agents: DashMap<String, Arc<BoundAgent>>,
    config: Arc<BridgeConfig>,
}

impl AgentBindings {
    /// Create an empty registry
    pub fn new(config: Arc<BridgeConfig>) -> Self {
        Self {
            agents: DashMap::new(),
            config,
        }
    }

    /// Register an (agent, invoker, bridge) tuple under an id
    ///
    /// Re-binding an id replaces the previous tuple and forgets its sessions.
    pub fn bind(
        &self,
        agent_id: impl Into<String>,
        runtime: Arc<dyn AgentRuntime>,
        invoker: Arc<ToolInvoker>,
        bridge: Arc<UiBridge>,
    ) -> Arc<BoundAgent> {
        let agent_id = agent_id.into();
        let bound = Arc::new(BoundAgent {
            agent_id: agent_id.clone(),
            runtime,
            invoker,
            bridge,
            sessions: DashMap::new(),
        });
        self.agents.insert(agent_id, bound.clone());
        bound
    }

    /// Look up a binding
    pub fn agent(&self, agent_id: &str) -> Option<Arc<BoundAgent>> {
        self.agents.get(agent_id).map(|e| e.value().clone())
    }

    /// Run one agent turn, driving the bound UI session
    ///
    /// The start toast, reply surfacing, and completion toast are all
    /// best-effort; only the agent's own failure propagates, after an error
    /// toast. Session activity is refreshed on both run paths.
    pub async fn run(
        &self,
        agent_id: &str,
        message: &str,
        session_id: Option<&str>,
        user_id: Option<&str>,
        context: Option<Value>,
    ) -> BridgeResult<AgentReply> {
        let bound = self
            .agent(agent_id)
            .ok_or_else(|| BridgeError::agent(format!("agent '{agent_id}' is not bound")))?;

        if let Some(session_id) = session_id {
            bound.touch_session(session_id, user_id);
            self.notify(
                &bound,
                session_id,
                UiAction::info_toast(format!("Agent '{agent_id}' started")),
            )
            .await;
        }

        match bound.runtime.run(message, context.as_ref()).await {
            Ok(reply) => {
                if let Some(session_id) = session_id {
                    self.surface_reply(&bound, session_id, &reply).await;
                    self.notify(
                        &bound,
                        session_id,
                        UiAction::success_toast(format!("Agent '{agent_id}' finished")),
                    )
                    .await;
                    bound.touch_session(session_id, user_id);
                }
                Ok(reply)
            }
            Err(e) => {
                if let Some(session_id) = session_id {
                    self.notify(
                        &bound,
                        session_id,
                        UiAction::error_toast(format!("Agent '{agent_id}' failed: {e}")),
                    )
                    .await;
                    bound.touch_session(session_id, user_id);
                }
                Err(e)
            }
        }
    }

    /// Remove every session idle longer than the configured timeout
    ///
    /// Expired sessions lose their channel record and translation context.
    /// Returns how many sessions were removed.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let idle_limit = self.config.session_timeout;
        let mut removed = 0;

        for entry in self.agents.iter() {
            let bound = entry.value();
            let expired: Vec<String> = bound
                .sessions
                .iter()
                .filter(|e| e.value().last_activity.lock().elapsed() > idle_limit)
                .map(|e| e.key().clone())
                .collect();

            for session_id in expired {
                bound.sessions.remove(&session_id);
                bound.bridge.expire_session(&session_id).await;
                debug!(agent_id = bound.agent_id, session_id, "idle session expired");
                removed += 1;
            }
        }
        removed
    }

    /// Drop a binding after cleaning up all of its sessions
    pub async fn remove(&self, agent_id: &str) -> bool {
        let Some((_, bound)) = self.agents.remove(agent_id) else {
            return false;
        };
        let sessions: Vec<String> = bound.sessions.iter().map(|e| e.key().clone()).collect();
        for session_id in sessions {
            bound.sessions.remove(&session_id);
            bound.bridge.expire_session(&session_id).await;
        }
        true
    }

    /// Number of registered bindings
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Spawn the periodic idle sweep
    ///
    /// The task runs [`AgentBindings::cleanup_expired_sessions`] every
    /// `sweep_interval` until the returned handle stops it. The registry
    /// never self-schedules beyond this helper.
    pub fn start_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let bindings = self.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let period = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticks.tick().await;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticks.tick() => {
                        let removed = bindings.cleanup_expired_sessions().await;
                        if removed > 0 {
                            debug!(removed, "idle sweep removed sessions");
                        }
                    }
                }
            }
        });

        SweeperHandle { token, handle }
    }

    /// Emit a lifecycle toast; bounded wait, failures logged and swallowed
    async fn notify(&self, bound: &BoundAgent, session_id: &str, action: UiAction) {
        let emit = bound.bridge.emit_actions(session_id, vec![action]);
        match timeout(self.config.notify_timeout, emit).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    agent_id = bound.agent_id,
                    session_id, "lifecycle notification not delivered"
                );
            }
            Err(_) => {
                warn!(
                    agent_id = bound.agent_id,
                    session_id, "lifecycle notification timed out"
                );
            }
        }
    }

    /// Derive UI actions from what the reply carries
    ///
    /// Tool calls embedded in the reply cover agents that invoke tools
    /// outside the invoker's direct path; long free text gets its own panel.
    async fn surface_reply(&self, bound: &BoundAgent, session_id: &str, reply: &AgentReply) {
        for call in &reply.tool_calls {
            let outcome = ToolOutcome::from_record(&call.tool, call.result.clone());
            let emit = bound.bridge.translate_and_emit(session_id, &outcome, None);
            if timeout(self.config.notify_timeout, emit).await.is_err() {
                warn!(
                    agent_id = bound.agent_id,
                    session_id,
                    tool = call.tool,
                    "tool call surfacing timed out"
                );
            }
        }

        if let Some(text) = reply.text.as_deref() {
            if text.len() > LONG_TEXT_THRESHOLD {
                let panel = UiAction::OpenPanel {
                    panel: REPLY_PANEL.into(),
                    content: Some(text.to_string()),
                };
                self.notify(bound, session_id, panel).await;
            }
        }
    }
}

/// Stops the idle sweep task
pub struct SweeperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Cancel the sweep and wait for the task to exit
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }

    /// Whether the sweep has been cancelled
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgentToolCall;
    use crate::actions::{SequencedAction, ToastLevel};
    use crate::channel::{ChannelManager, LocalTransport, ServerEvent};
    use crate::telemetry::BridgeMetrics;
    use crate::tools::ToolHost;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::broadcast;

    struct ScriptedAgent {
        reply: BridgeResult<AgentReply>,
    }

    #[async_trait]
    impl AgentRuntime for ScriptedAgent {
        async fn run(&self, _message: &str, _context: Option<&Value>) -> BridgeResult<AgentReply> {
            self.reply.clone()
        }
    }

    struct NullHost;

    #[async_trait]
    impl ToolHost for NullHost {
        fn has_tool(&self, _tool: &str) -> bool {
            true
        }
        async fn call(&self, _tool: &str, _params: Value) -> BridgeResult<Value> {
            Ok(json!({}))
        }
    }

    struct Fixture {
        transport: Arc<LocalTransport>,
        bridge: Arc<UiBridge>,
        bindings: Arc<AgentBindings>,
    }

    impl Fixture {
        fn bind(&self, agent_id: &str, reply: BridgeResult<AgentReply>) {
            let config = Arc::new(BridgeConfig::default());
            let metrics = self.bridge.metrics().clone();
            let invoker = Arc::new(ToolInvoker::new(
                Arc::new(NullHost),
                self.bridge.clone(),
                metrics,
                config,
            ));
            self.bindings.bind(
                agent_id,
                Arc::new(ScriptedAgent { reply }),
                invoker,
                self.bridge.clone(),
            );
        }

        async fn join(&self, session_id: &str) -> broadcast::Receiver<ServerEvent> {
            let mut rx = self.transport.listen(&ChannelManager::room_for(session_id));
            self.bridge
                .channel()
                .join(session_id, None, "conn-test")
                .await
                .unwrap();
            match rx.recv().await.unwrap() {
                ServerEvent::Joined { .. } => {}
                other => panic!("expected join ack, got {other:?}"),
            }
            rx
        }
    }

    fn fixture_with(config: BridgeConfig) -> Fixture {
        let config = Arc::new(config);
        let transport = Arc::new(LocalTransport::new());
        let channel = Arc::new(ChannelManager::new(transport.clone(), config.clone()));
        let metrics = Arc::new(BridgeMetrics::new(config.enable_metrics));
        let bridge = Arc::new(UiBridge::new(channel, metrics, config.clone()));
        let bindings = Arc::new(AgentBindings::new(config));
        Fixture {
            transport,
            bridge,
            bindings,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(BridgeConfig::default())
    }

    async fn next_actions(rx: &mut broadcast::Receiver<ServerEvent>) -> Vec<SequencedAction> {
        loop {
            match rx.recv().await.unwrap() {
                ServerEvent::Actions { actions } => return actions,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_run_unbound_agent_fails() {
        let fx = fixture();
        let err = fx
            .bindings
            .run("ghost", "hello", None, None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_run_emits_start_and_completion_toasts() {
        let fx = fixture();
        fx.bind("writer", Ok(AgentReply::text("done")));
        let mut rx = fx.join("s1").await;

        let reply = fx
            .bindings
            .run("writer", "draft the summary", Some("s1"), Some("u1"), None)
            .await
            .unwrap();
        assert_eq!(reply.text.as_deref(), Some("done"));

        let start = next_actions(&mut rx).await;
        match &start[0].action {
            UiAction::ShowToast { message, level } => {
                assert_eq!(*level, ToastLevel::Info);
                assert!(message.contains("writer"));
            }
            other => panic!("expected start toast, got {other:?}"),
        }

        let finish = next_actions(&mut rx).await;
        match &finish[0].action {
            UiAction::ShowToast { message, level } => {
                assert_eq!(*level, ToastLevel::Success);
                assert!(message.contains("writer"));
            }
            other => panic!("expected completion toast, got {other:?}"),
        }

        let bound = fx.bindings.agent("writer").unwrap();
        assert!(bound.has_session("s1"));
    }

    #[tokio::test]
    async fn test_long_text_opens_panel_before_completion_toast() {
        let fx = fixture();
        let long_text = "a".repeat(500);
        fx.bind("writer", Ok(AgentReply::text(long_text.clone())));
        let mut rx = fx.join("s1").await;

        fx.bindings
            .run("writer", "expand", Some("s1"), None, None)
            .await
            .unwrap();

        let _start = next_actions(&mut rx).await;
        let panel = next_actions(&mut rx).await;
        match &panel[0].action {
            UiAction::OpenPanel { panel, content } => {
                assert_eq!(panel, "agent_reply");
                assert_eq!(content.as_deref(), Some(long_text.as_str()));
            }
            other => panic!("expected open_panel, got {other:?}"),
        }
        let finish = next_actions(&mut rx).await;
        assert_eq!(finish[0].action.kind(), "show_toast");
    }

    #[tokio::test]
    async fn test_short_text_gets_no_panel() {
        let fx = fixture();
        fx.bind("writer", Ok(AgentReply::text("brief")));
        let mut rx = fx.join("s1").await;

        fx.bindings
            .run("writer", "shorten", Some("s1"), None, None)
            .await
            .unwrap();

        let _start = next_actions(&mut rx).await;
        let second = next_actions(&mut rx).await;
        // Straight to the completion toast
        assert_eq!(second[0].action.kind(), "show_toast");
    }

    #[tokio::test]
    async fn test_embedded_tool_calls_rederive_actions() {
        let fx = fixture();
        let reply = AgentReply {
            text: None,
            tool_calls: vec![AgentToolCall {
                tool: "validate_report_data".into(),
                result: json!({
                    "valid": false,
                    "errors": [{ "field": "title", "message": "required" }]
                }),
            }],
        };
        fx.bind("writer", Ok(reply));
        let mut rx = fx.join("s1").await;

        fx.bindings
            .run("writer", "check", Some("s1"), None, None)
            .await
            .unwrap();

        let _start = next_actions(&mut rx).await;
        let derived = next_actions(&mut rx).await;
        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0].action, UiAction::highlight("title", "required"));
        assert_eq!(derived[1].action.kind(), "show_toast");
    }

    #[tokio::test]
    async fn test_failed_run_emits_error_toast_and_rethrows() {
        let fx = fixture();
        fx.bind("writer", Err(BridgeError::agent("model unavailable")));
        let mut rx = fx.join("s1").await;

        let err = fx
            .bindings
            .run("writer", "draft", Some("s1"), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model unavailable"));

        let _start = next_actions(&mut rx).await;
        let failure = next_actions(&mut rx).await;
        match &failure[0].action {
            UiAction::ShowToast { message, level } => {
                assert_eq!(*level, ToastLevel::Error);
                assert!(message.contains("writer"));
                assert!(message.contains("model unavailable"));
            }
            other => panic!("expected error toast, got {other:?}"),
        }

        // The error path still refreshed the session record
        assert!(fx.bindings.agent("writer").unwrap().has_session("s1"));
    }

    #[tokio::test]
    async fn test_run_without_session_touches_no_ui() {
        let fx = fixture();
        fx.bind("writer", Ok(AgentReply::text("quiet")));
        let mut rx = fx.join("s1").await;

        fx.bindings
            .run("writer", "draft", None, None, None)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(fx.bindings.agent("writer").unwrap().session_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_sessions() {
        let fx = fixture_with(BridgeConfig::default().with_session_timeout(Duration::ZERO));
        fx.bind("writer", Ok(AgentReply::text("x")));
        fx.join("s1").await;

        fx.bindings
            .run("writer", "draft", Some("s1"), None, None)
            .await
            .unwrap();
        let bound = fx.bindings.agent("writer").unwrap();
        assert!(bound.has_session("s1"));

        // Timeout zero: any elapsed time expires the session
        let removed = fx.bindings.cleanup_expired_sessions().await;
        assert_eq!(removed, 1);
        assert!(!bound.has_session("s1"));
        assert!(!fx.bridge.channel().has_session("s1"));
        assert!(fx.bridge.context("s1").is_none());
    }

    #[tokio::test]
    async fn test_cleanup_retains_active_sessions() {
        let fx = fixture();
        fx.bind("writer", Ok(AgentReply::text("x")));
        fx.bindings
            .run("writer", "draft", Some("s1"), None, None)
            .await
            .unwrap();

        let removed = fx.bindings.cleanup_expired_sessions().await;
        assert_eq!(removed, 0);
        assert!(fx.bindings.agent("writer").unwrap().has_session("s1"));
    }

    #[tokio::test]
    async fn test_remove_cleans_all_sessions() {
        let fx = fixture();
        fx.bind("writer", Ok(AgentReply::text("x")));
        fx.join("s1").await;
        fx.bindings
            .run("writer", "draft", Some("s1"), None, None)
            .await
            .unwrap();

        assert!(fx.bindings.remove("writer").await);
        assert!(fx.bindings.agent("writer").is_none());
        assert!(!fx.bridge.channel().has_session("s1"));
        assert!(!fx.bindings.remove("writer").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_sessions_on_interval() {
        let config = BridgeConfig::default()
            .with_session_timeout(Duration::ZERO)
            .with_sweep_interval(Duration::from_secs(1));
        let fx = fixture_with(config);
        fx.bind("writer", Ok(AgentReply::text("x")));
        fx.bindings
            .run("writer", "draft", Some("s1"), None, None)
            .await
            .unwrap();

        let sweeper = fx.bindings.start_sweeper();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let bound = fx.bindings.agent("writer").unwrap();
        assert!(!bound.has_session("s1"));
        assert!(!sweeper.is_stopped());
        sweeper.stop().await;
    }
}
