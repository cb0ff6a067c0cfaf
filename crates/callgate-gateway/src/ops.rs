// crates/callgate-gateway/src/ops.rs
// ============================================================================
// Module: Call Gate Operational Events
// Description: Side-channel for gateway health events.
// Purpose: Surface failures that must never reach the caller or the audit trail.
// Dependencies: serde, tracing
// ============================================================================

//! ## Overview
//! The operational side-channel is distinct from both the caller response and
//! the audit trail. Audit queue pressure, audit write failures and execution
//! failure detail are reported here so that callers observe identical results
//! whether or not the audit writer is healthy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Operational event emitted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OpsEvent {
    /// Engine finished building.
    EngineStarted {
        /// Number of registered actions.
        actions: usize,
        /// Whether debug request capture is active.
        debug_capture: bool,
    },
    /// Debug request capture is active; arguments reach the audit trail.
    DebugCaptureEnabled,
    /// Audit queue was full; the entry was dropped.
    AuditQueueFull {
        /// Trace id of the dropped entry.
        trace_id: String,
    },
    /// Audit writer is gone; the entry was dropped.
    AuditQueueClosed {
        /// Trace id of the dropped entry.
        trace_id: String,
    },
    /// Audit writer failed to persist an entry.
    AuditWriteFailed {
        /// Trace id of the failed entry (empty for flush failures).
        trace_id: String,
        /// Writer error message.
        error: String,
    },
    /// Action handler failed or timed out.
    ExecutionFailed {
        /// Trace id of the call.
        trace_id: String,
        /// Action name.
        action: String,
        /// Failure reason.
        reason: String,
        /// Process exit code when observed.
        exit_code: Option<i32>,
        /// Whether the call deadline elapsed.
        timed_out: bool,
    },
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Receiver of operational events.
pub trait OpsSink: Send + Sync {
    /// Record an operational event.
    fn record(&self, event: &OpsEvent);
}

/// Ops sink emitting structured `tracing` events under `callgate::ops`.
pub struct TracingOpsSink;

impl OpsSink for TracingOpsSink {
    fn record(&self, event: &OpsEvent) {
        match event {
            OpsEvent::EngineStarted {
                actions,
                debug_capture,
            } => {
                tracing::info!(target: "callgate::ops", actions, debug_capture, "gateway ready");
            }
            OpsEvent::DebugCaptureEnabled => {
                tracing::warn!(
                    target: "callgate::ops",
                    "DEBUG AUDIT CAPTURE ENABLED: call arguments are written to the audit trail"
                );
            }
            OpsEvent::AuditQueueFull {
                trace_id,
            } => {
                tracing::error!(target: "callgate::ops", %trace_id, "audit queue full; entry dropped");
            }
            OpsEvent::AuditQueueClosed {
                trace_id,
            } => {
                tracing::error!(target: "callgate::ops", %trace_id, "audit writer closed; entry dropped");
            }
            OpsEvent::AuditWriteFailed {
                trace_id,
                error,
            } => {
                tracing::error!(target: "callgate::ops", %trace_id, %error, "audit write failed");
            }
            OpsEvent::ExecutionFailed {
                trace_id,
                action,
                reason,
                exit_code,
                timed_out,
            } => {
                tracing::warn!(
                    target: "callgate::ops",
                    %trace_id,
                    %action,
                    %reason,
                    exit_code = exit_code.unwrap_or(-1),
                    timed_out,
                    "action execution failed"
                );
            }
        }
    }
}

/// No-op ops sink.
pub struct NoopOpsSink;

impl OpsSink for NoopOpsSink {
    fn record(&self, _event: &OpsEvent) {}
}

/// Ops sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryOpsSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<OpsEvent>>,
}

impl MemoryOpsSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<OpsEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl OpsSink for MemoryOpsSink {
    fn record(&self, event: &OpsEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
