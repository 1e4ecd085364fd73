//! Telemetry for bridge emissions and tool invocations
//!
//! Process-wide accumulators keyed by tool name or action kind. Latency
//! windows are bounded to the most recent N samples so long-lived processes
//! do not grow without bound. None of this is part of correctness.

pub mod metrics;

pub use metrics::{BridgeMetrics, Counter, LatencySummary, MetricsSnapshot, SampleWindow};
