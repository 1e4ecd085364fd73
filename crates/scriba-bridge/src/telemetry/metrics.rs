//! Metric types and the bridge-wide accumulator

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of latency samples retained per key
const SAMPLE_WINDOW_SIZE: usize = 100;

/// Counter metric (monotonically increasing)
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by a specific amount
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get current count
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Get the counter name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Bounded window of recent latency samples, in milliseconds
#[derive(Debug)]
pub struct SampleWindow {
    samples: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl SampleWindow {
    /// Create a window with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(SAMPLE_WINDOW_SIZE)
    }

    /// Create a window with a custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record a duration sample; the oldest sample is evicted once full
    pub fn record(&self, duration: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(duration.as_secs_f64() * 1000.0);
    }

    /// Number of retained samples
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether the window holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Summarize the retained samples
    pub fn summary(&self) -> LatencySummary {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return LatencySummary::default();
        }
        let count = samples.len() as u64;
        let sum: f64 = samples.iter().sum();
        let max = samples.iter().cloned().fold(f64::MIN, f64::max);
        LatencySummary {
            count,
            mean_ms: sum / count as f64,
            max_ms: max,
        }
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated view of a sample window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Number of samples in the window
    pub count: u64,
    /// Mean latency in milliseconds
    pub mean_ms: f64,
    /// Maximum latency in milliseconds
    pub max_ms: f64,
}

/// Process-wide metrics for the bridge
///
/// All recording methods are no-ops when metrics are disabled in the config.
#[derive(Debug)]
pub struct BridgeMetrics {
    enabled: bool,

    /// Actions accepted and handed to the channel
    pub actions_emitted: Counter,
    /// Actions dropped by validation
    pub actions_dropped: Counter,
    /// Whole batches rejected (empty valid subset or oversized)
    pub batches_rejected: Counter,
    /// Payloads rejected by the size ceiling
    pub oversized_payloads: Counter,

    /// Total tool invocations reaching a terminal outcome
    pub tool_calls: Counter,
    /// Tool invocations that succeeded
    pub tool_success: Counter,
    /// Tool invocation attempts that failed
    pub tool_failures: Counter,
    /// Retry attempts scheduled
    pub tool_retries: Counter,

    drops_by_kind: DashMap<String, u64>,
    emit_latency: DashMap<String, SampleWindow>,
    tool_latency: DashMap<String, SampleWindow>,
}

impl BridgeMetrics {
    /// Create a metrics accumulator
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            actions_emitted: Counter::new("ui_actions_emitted_total"),
            actions_dropped: Counter::new("ui_actions_dropped_total"),
            batches_rejected: Counter::new("ui_action_batches_rejected_total"),
            oversized_payloads: Counter::new("ui_payloads_oversized_total"),
            tool_calls: Counter::new("tool_calls_total"),
            tool_success: Counter::new("tool_success_total"),
            tool_failures: Counter::new("tool_failures_total"),
            tool_retries: Counter::new("tool_retries_total"),
            drops_by_kind: DashMap::new(),
            emit_latency: DashMap::new(),
            tool_latency: DashMap::new(),
        }
    }

    /// Whether recording is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record actions successfully handed to the channel
    pub fn record_emitted(&self, count: u64) {
        if self.enabled {
            self.actions_emitted.inc_by(count);
        }
    }

    /// Record a single dropped action, keyed by its kind
    pub fn record_drop(&self, kind: &str) {
        if !self.enabled {
            return;
        }
        self.actions_dropped.inc();
        *self.drops_by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Record a whole-batch rejection
    pub fn record_batch_rejected(&self) {
        if self.enabled {
            self.batches_rejected.inc();
        }
    }

    /// Record a payload rejected by the size ceiling
    pub fn record_oversized(&self) {
        if self.enabled {
            self.oversized_payloads.inc();
        }
    }

    /// Record the latency of one channel emission, keyed by tool name
    pub fn record_emit_latency(&self, tool: &str, latency: Duration) {
        if !self.enabled {
            return;
        }
        self.emit_latency
            .entry(tool.to_string())
            .or_default()
            .record(latency);
    }

    /// Record a terminal tool invocation outcome with its total latency
    pub fn record_tool_call(&self, tool: &str, latency: Duration, success: bool) {
        if !self.enabled {
            return;
        }
        self.tool_calls.inc();
        if success {
            self.tool_success.inc();
        } else {
            self.tool_failures.inc();
        }
        self.tool_latency
            .entry(tool.to_string())
            .or_default()
            .record(latency);
    }

    /// Record one failed attempt that has not reached a terminal outcome
    pub fn record_tool_failure(&self) {
        if self.enabled {
            self.tool_failures.inc();
        }
    }

    /// Record one scheduled retry
    pub fn record_tool_retry(&self) {
        if self.enabled {
            self.tool_retries.inc();
        }
    }

    /// Dropped-action count for one kind
    pub fn drops_for_kind(&self, kind: &str) -> u64 {
        self.drops_by_kind.get(kind).map(|e| *e).unwrap_or(0)
    }

    /// Export a serializable snapshot of all accumulators
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            actions_emitted: self.actions_emitted.get(),
            actions_dropped: self.actions_dropped.get(),
            batches_rejected: self.batches_rejected.get(),
            oversized_payloads: self.oversized_payloads.get(),
            tool_calls: self.tool_calls.get(),
            tool_success: self.tool_success.get(),
            tool_failures: self.tool_failures.get(),
            tool_retries: self.tool_retries.get(),
            drops_by_kind: self
                .drops_by_kind
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            emit_latency: self
                .emit_latency
                .iter()
                .map(|e| (e.key().clone(), e.value().summary()))
                .collect(),
            tool_latency: self
                .tool_latency
                .iter()
                .map(|e| (e.key().clone(), e.value().summary()))
                .collect(),
        }
    }
}

/// Point-in-time export of the bridge metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub actions_emitted: u64,
    pub actions_dropped: u64,
    pub batches_rejected: u64,
    pub oversized_payloads: u64,
    pub tool_calls: u64,
    pub tool_success: u64,
    pub tool_failures: u64,
    pub tool_retries: u64,
    pub drops_by_kind: HashMap<String, u64>,
    pub emit_latency: HashMap<String, LatencySummary>,
    pub tool_latency: HashMap<String, LatencySummary>,
}
