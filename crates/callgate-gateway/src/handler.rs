// crates/callgate-gateway/src/handler.rs
// ============================================================================
// Module: Call Gate Action Handlers
// Description: Handler contract, execution context and named handler sets.
// Purpose: Define how validated input becomes raw action output.
// Dependencies: async-trait, callgate-core, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! An [`ActionHandler`] receives schema-validated input and returns raw
//! output, which the engine then validates and filters. Handlers never see
//! credentials. Failures carry audit-only detail; the caller only ever sees a
//! generic execution failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use callgate_core::ActionName;
use callgate_core::InternalDetail;
use callgate_core::TraceId;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Failures
// ============================================================================

/// Handler failure with audit-only detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ExecutionFailure {
    /// Failure reason.
    pub reason: String,
    /// Process exit code when one was observed.
    pub exit_code: Option<i32>,
    /// Whether the process was terminated by a signal.
    pub signal: bool,
    /// Whether the call deadline elapsed.
    pub timed_out: bool,
}

impl ExecutionFailure {
    /// Builds a failure with only a reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            exit_code: None,
            signal: false,
            timed_out: false,
        }
    }

    /// Builds the failure reported when the call deadline elapses.
    #[must_use]
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            reason: format!("timed out after {} ms", timeout.as_millis()),
            exit_code: None,
            signal: false,
            timed_out: true,
        }
    }

    /// Converts into the audit detail.
    #[must_use]
    pub fn into_detail(self) -> InternalDetail {
        InternalDetail::Execution {
            reason: self.reason,
            exit_code: self.exit_code,
            signal: self.signal,
            timed_out: self.timed_out,
        }
    }
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Per-call context handed to handlers.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Trace id of the call.
    pub trace_id: TraceId,
    /// Action being executed.
    pub action: ActionName,
    /// Verified caller subject.
    pub subject: String,
    /// Deadline budget for the call.
    pub timeout: Duration,
}

// ============================================================================
// SECTION: Handler Contract
// ============================================================================

/// Executes an action over validated input.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the action.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionFailure`] when the action cannot produce output.
    async fn execute(&self, input: &Value, ctx: &HandlerContext) -> Result<Value, ExecutionFailure>;
}

/// Named handlers referenced by `handler = { kind = "named" }` entries.
#[derive(Clone, Default)]
pub struct HandlerSet {
    /// Handlers by name.
    handlers: BTreeMap<String, Arc<dyn ActionHandler>>,
}

impl HandlerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler, replacing any previous one with the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.insert(name, handler);
        self
    }

    /// Adds a handler, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Returns the handler registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Returns the registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// Handler wrapping a synchronous closure.
///
/// The closure runs on the blocking thread pool, so a slow closure cannot
/// stall the runtime and the call deadline still returns on time. A closure
/// that outlives its deadline keeps its blocking thread until it returns.
pub struct FnHandler<F> {
    /// Wrapped closure.
    func: Arc<F>,
}

impl<F> FnHandler<F>
where
    F: Fn(&Value) -> Result<Value, ExecutionFailure> + Send + Sync + 'static,
{
    /// Wraps a closure as a handler.
    #[must_use]
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&Value) -> Result<Value, ExecutionFailure> + Send + Sync + 'static,
{
    async fn execute(&self, input: &Value, _ctx: &HandlerContext) -> Result<Value, ExecutionFailure> {
        let func = Arc::clone(&self.func);
        let input = input.clone();
        tokio::task::spawn_blocking(move || func(&input))
            .await
            .map_err(|err| ExecutionFailure::new(format!("handler task failed: {err}")))?
    }
}
