// crates/callgate-gateway/src/engine.rs
// ============================================================================
// Module: Call Gate Proxy Engine
// Description: Call pipeline orchestration and engine wiring.
// Purpose: Sequence every governed call and emit exactly one audit entry.
// Dependencies: callgate-config, callgate-core, rand, time, tokio
// ============================================================================

//! ## Overview
//! [`ProxyEngine`] drives each call through a fixed sequence of stages:
//! lookup, permission, input validation, execution, output validation and
//! output filtering. Each stage either hands a value to the next or stops the
//! call with a [`CallFailure`]. Whatever the exit point, one audit entry is
//! built synchronously from the pipeline state and dispatched without
//! blocking.
//!
//! Security posture: the caller sees generic messages for permission,
//! execution and output failures. Missing permissions, exit codes and schema
//! locations are recorded in the audit trail only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use callgate_config::GatewayConfig;
use callgate_core::ActionName;
use callgate_core::ActionRegistry;
use callgate_core::ActionSnapshot;
use callgate_core::AuditEntry;
use callgate_core::CallFailure;
use callgate_core::CallResult;
use callgate_core::CallerContext;
use callgate_core::CallerSnapshot;
use callgate_core::Denial;
use callgate_core::Decision;
use callgate_core::FilterOutcome;
use callgate_core::HandlerRef;
use callgate_core::HashDigest;
use callgate_core::OutputFormat;
use callgate_core::PermissionEngine;
use callgate_core::ResponseMeta;
use callgate_core::TraceId;
use callgate_core::filter;
use callgate_core::fingerprint_json;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::audit::AuditCapture;
use crate::audit::AuditError;
use crate::audit::AuditLogger;
use crate::audit::AuditWriter;
use crate::audit::DailyFileAuditWriter;
use crate::audit::StderrAuditWriter;
use crate::auth::AuthError;
use crate::auth::Credential;
use crate::auth::CredentialVerifier;
use crate::auth::DefaultCredentialVerifier;
use crate::auth::DenyAllVerifier;
use crate::capabilities::ActionDescriptor;
use crate::capabilities::describe;
use crate::command::CommandHandler;
use crate::command::TransformSet;
use crate::handler::ActionHandler;
use crate::handler::ExecutionFailure;
use crate::handler::HandlerContext;
use crate::handler::HandlerSet;
use crate::ops::OpsEvent;
use crate::ops::OpsSink;
use crate::ops::TracingOpsSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Engine construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A catalog entry names a handler that was not supplied.
    #[error("action {action} references unknown handler {name}")]
    UnknownHandler {
        /// Action name.
        action: String,
        /// Handler name.
        name: String,
    },
    /// A command output format names a transform that was not supplied.
    #[error("action {action} references unknown transform {transform}")]
    UnknownTransform {
        /// Action name.
        action: String,
        /// Transform name.
        transform: String,
    },
    /// A command executable is not in the allow-list.
    #[error("action {action} executable {executable} is not allow-listed")]
    ExecutableNotAllowed {
        /// Action name.
        action: String,
        /// Executable path.
        executable: String,
    },
    /// Configuration could not be turned into a registry.
    #[error("config error: {0}")]
    Config(String),
    /// Audit logger could not start.
    #[error("audit error: {0}")]
    Audit(String),
    /// Credential verifier could not be built.
    #[error("auth error: {0}")]
    Auth(String),
}

impl From<AuditError> for BuildError {
    fn from(error: AuditError) -> Self {
        Self::Audit(error.to_string())
    }
}

impl From<AuthError> for BuildError {
    fn from(error: AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Wires a registry, handlers and sinks into a [`ProxyEngine`].
pub struct ProxyEngineBuilder {
    /// Action catalog.
    registry: ActionRegistry,
    /// Audit dispatcher.
    audit: AuditLogger,
    /// Named handlers.
    handlers: HandlerSet,
    /// Named output transforms.
    transforms: TransformSet,
    /// Executables command actions may run.
    allowed_executables: BTreeSet<PathBuf>,
    /// Credential verifier used by `invoke`.
    verifier: Arc<dyn CredentialVerifier>,
    /// Operational side-channel.
    ops: Arc<dyn OpsSink>,
    /// Request capture mode.
    capture: AuditCapture,
    /// Timeout for actions without their own.
    default_timeout: Duration,
}

impl ProxyEngineBuilder {
    /// Starts a builder over a registry and audit logger.
    #[must_use]
    pub fn new(registry: ActionRegistry, audit: AuditLogger) -> Self {
        Self {
            registry,
            audit,
            handlers: HandlerSet::new(),
            transforms: TransformSet::new(),
            allowed_executables: BTreeSet::new(),
            verifier: Arc::new(DenyAllVerifier),
            ops: Arc::new(TracingOpsSink),
            capture: AuditCapture::Production,
            default_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Adds a named handler.
    #[must_use]
    pub fn handler(mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    /// Replaces the named handler set.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerSet) -> Self {
        self.handlers = handlers;
        self
    }

    /// Adds a named output transform.
    #[must_use]
    pub fn transform<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.transforms.insert(name, transform);
        self
    }

    /// Replaces the transform set.
    #[must_use]
    pub fn transforms(mut self, transforms: TransformSet) -> Self {
        self.transforms = transforms;
        self
    }

    /// Sets the executable allow-list.
    #[must_use]
    pub fn allowed_executables<I, P>(mut self, executables: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.allowed_executables = executables.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the credential verifier.
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Sets the ops sink.
    #[must_use]
    pub fn ops(mut self, ops: Arc<dyn OpsSink>) -> Self {
        self.ops = ops;
        self
    }

    /// Sets the request capture mode.
    #[must_use]
    pub const fn capture(mut self, capture: AuditCapture) -> Self {
        self.capture = capture;
        self
    }

    /// Sets the default per-call timeout.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Resolves every action's handler and starts the engine.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when a handler or transform is unknown or an
    /// executable is not allow-listed.
    pub fn build(self) -> Result<ProxyEngine, BuildError> {
        let transforms = Arc::new(self.transforms);
        let mut resolved: BTreeMap<ActionName, Arc<dyn ActionHandler>> = BTreeMap::new();
        for definition in self.registry.list() {
            let action = definition.name.to_string();
            let handler: Arc<dyn ActionHandler> = match &definition.handler {
                HandlerRef::Command(spec) => {
                    if !self.allowed_executables.contains(&spec.executable) {
                        return Err(BuildError::ExecutableNotAllowed {
                            action,
                            executable: spec.executable.display().to_string(),
                        });
                    }
                    if let OutputFormat::Custom {
                        transform,
                    } = &spec.output
                        && !transforms.contains(transform)
                    {
                        return Err(BuildError::UnknownTransform {
                            action,
                            transform: transform.clone(),
                        });
                    }
                    Arc::new(CommandHandler::new(spec.clone(), Arc::clone(&transforms)))
                }
                HandlerRef::Named {
                    name,
                } => self.handlers.get(name).ok_or_else(|| BuildError::UnknownHandler {
                    action,
                    name: name.clone(),
                })?,
            };
            resolved.insert(definition.name.clone(), handler);
        }
        if self.capture == AuditCapture::Debug {
            self.ops.record(&OpsEvent::DebugCaptureEnabled);
        }
        self.ops.record(&OpsEvent::EngineStarted {
            actions: self.registry.len(),
            debug_capture: self.capture == AuditCapture::Debug,
        });
        Ok(ProxyEngine {
            registry: self.registry,
            handlers: resolved,
            verifier: self.verifier,
            audit: self.audit,
            ops: self.ops,
            permissions: PermissionEngine::new(),
            capture: self.capture,
            default_timeout: self.default_timeout,
        })
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Audit fields known before the pipeline runs.
struct PendingAudit {
    /// Call trace id.
    trace_id: TraceId,
    /// Caller snapshot.
    caller: CallerSnapshot,
    /// Action snapshot; classification filled in after lookup.
    action: ActionSnapshot,
    /// Request fingerprint.
    fingerprint: HashDigest,
    /// Debug request capture.
    capture: Option<Value>,
    /// Wall-clock call start.
    started_at: OffsetDateTime,
    /// Monotonic call start.
    started: Instant,
}

impl PendingAudit {
    /// Starts the audit state for a call.
    fn start(caller: CallerSnapshot, action: &str, args: &Value) -> Self {
        Self {
            trace_id: TraceId::from_u128(rand::random::<u128>()),
            caller,
            action: ActionSnapshot {
                name: ActionName::new(action),
                classification: None,
            },
            fingerprint: fingerprint_json(args),
            capture: None,
            started_at: OffsetDateTime::now_utc(),
            started: Instant::now(),
        }
    }

    /// Completes the entry from the pipeline outcome.
    fn finish(self, outcome: Result<&FilterOutcome, &CallFailure>) -> AuditEntry {
        let (decision, denial, response) = match outcome {
            Ok(filtered) => (
                Decision::Allowed,
                None,
                Some(ResponseMeta {
                    touched_paths: filtered.touched_paths.clone(),
                    output_hash: fingerprint_json(&filtered.filtered),
                }),
            ),
            Err(failure) => (
                failure.code.decision(),
                Some(Denial {
                    code: failure.code,
                    reason: failure.message.clone(),
                    stage: failure.stage,
                    detail: failure.internal.clone(),
                }),
                None,
            ),
        };
        AuditEntry {
            timestamp: self.started_at.format(&Rfc3339).unwrap_or_default(),
            trace_id: self.trace_id,
            caller: self.caller,
            action: self.action,
            request_fingerprint: self.fingerprint,
            request_capture: self.capture,
            decision,
            denial,
            response,
            duration_us: u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX),
        }
    }
}

/// Call-governance engine.
///
/// # Invariants
/// - Every registered action has a resolved handler.
/// - Exactly one audit entry is logged per `call` or `invoke`.
pub struct ProxyEngine {
    /// Immutable action catalog.
    registry: ActionRegistry,
    /// Resolved handler per action.
    handlers: BTreeMap<ActionName, Arc<dyn ActionHandler>>,
    /// Credential verifier.
    verifier: Arc<dyn CredentialVerifier>,
    /// Audit dispatcher.
    audit: AuditLogger,
    /// Operational side-channel.
    ops: Arc<dyn OpsSink>,
    /// Permission evaluator.
    permissions: PermissionEngine,
    /// Request capture mode.
    capture: AuditCapture,
    /// Timeout for actions without their own.
    default_timeout: Duration,
}

impl ProxyEngine {
    /// Builds an engine from gateway configuration.
    ///
    /// Audit entries go to the configured directory, or to stderr when no
    /// directory is set.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the catalog, audit directory, key material
    /// or handler wiring is invalid.
    pub fn from_config(
        config: &GatewayConfig,
        handlers: HandlerSet,
        transforms: TransformSet,
        ops: Arc<dyn OpsSink>,
    ) -> Result<Self, BuildError> {
        let registry = config.build_registry().map_err(|err| BuildError::Config(err.to_string()))?;
        let writer: Box<dyn AuditWriter + Send> = match &config.audit.dir {
            Some(dir) => Box::new(DailyFileAuditWriter::open(dir)?),
            None => Box::new(StderrAuditWriter),
        };
        let audit = AuditLogger::new(writer, config.audit.queue_capacity, Arc::clone(&ops))?;
        let verifier = DefaultCredentialVerifier::from_config(&config.auth)?;
        ProxyEngineBuilder::new(registry, audit)
            .handlers(handlers)
            .transforms(transforms)
            .allowed_executables(config.execution.allowed_executables.iter().cloned())
            .verifier(Arc::new(verifier))
            .ops(ops)
            .capture(AuditCapture::from_debug_flag(config.audit.debug_capture))
            .default_timeout(config.execution.default_timeout())
            .build()
    }

    /// Returns the action catalog.
    #[must_use]
    pub const fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Lists capability descriptors in registration order.
    #[must_use]
    pub fn capabilities(&self) -> Vec<ActionDescriptor> {
        describe(&self.registry)
    }

    /// Verifies a credential, then runs the call.
    ///
    /// Verification failures produce an `Unauthenticated` result and one
    /// denied audit entry attributed to the anonymous subject.
    pub async fn invoke(&self, credential: &Credential, action: &str, args: Value) -> CallResult {
        match self.verifier.verify(credential) {
            Ok(caller) => self.call(&caller, action, args).await,
            Err(err) => {
                let reason = match err {
                    AuthError::Unauthenticated(reason) => reason,
                    other @ AuthError::InvalidKey { .. } => other.to_string(),
                };
                let mut pending = PendingAudit::start(CallerSnapshot::anonymous(), action, &args);
                pending.action.classification =
                    self.registry.get(action).map(|definition| definition.classification);
                let failure = CallFailure::unauthenticated(reason);
                self.audit.log(pending.finish(Err(&failure)));
                CallResult::Failure(failure)
            }
        }
    }

    /// Runs a call for an already verified caller.
    pub async fn call(&self, caller: &CallerContext, action: &str, args: Value) -> CallResult {
        let mut pending = PendingAudit::start(caller.snapshot(), action, &args);
        let outcome = self.run(&mut pending, caller, action, args).await;
        self.audit.log(pending.finish(outcome.as_ref()));
        match outcome {
            Ok(filtered) => CallResult::Success {
                data: filtered.filtered,
            },
            Err(failure) => CallResult::Failure(failure),
        }
    }

    /// Waits until every audit entry logged so far has been written.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Closed`] when the audit writer has stopped.
    pub async fn flush_audit(&self) -> Result<(), AuditError> {
        self.audit.flush().await
    }

    /// Drains and stops the audit writer.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the writer already stopped or failed to
    /// join.
    pub async fn shutdown(&self) -> Result<(), AuditError> {
        self.audit.shutdown().await
    }

    /// Pipeline stages from lookup through output filtering.
    async fn run(
        &self,
        pending: &mut PendingAudit,
        caller: &CallerContext,
        action: &str,
        args: Value,
    ) -> Result<FilterOutcome, CallFailure> {
        // LOOKUP
        let entry = self.registry.entry(action).ok_or_else(CallFailure::not_found)?;
        let handler = self.handlers.get(action).ok_or_else(CallFailure::not_found)?;
        let definition = entry.definition();
        pending.action.classification = Some(definition.classification);
        pending.capture = self.capture.capture_request(&args, &definition.sensitive_inputs);

        // PERMISSION
        let decision = self.permissions.check(caller, definition, &args);
        if !decision.allowed {
            return Err(CallFailure::forbidden(
                decision.missing.into_iter().collect(),
                decision.elevation.label(),
            ));
        }

        // VALIDATE_INPUT
        let input = entry
            .validate_input(args)
            .map_err(|violation| {
                CallFailure::invalid_input(violation.caller_details(), violation.locations())
            })?;

        // EXECUTE
        let timeout = definition.timeout.unwrap_or(self.default_timeout);
        let ctx = HandlerContext {
            trace_id: pending.trace_id.clone(),
            action: definition.name.clone(),
            subject: caller.subject.clone(),
            timeout,
        };
        let output = match tokio::time::timeout(timeout, handler.execute(&input, &ctx)).await {
            Ok(Ok(output)) => output,
            Ok(Err(failure)) => return Err(self.execution_failed(&ctx, failure)),
            Err(_) => return Err(self.execution_failed(&ctx, ExecutionFailure::timed_out(timeout))),
        };

        // VALIDATE_OUTPUT
        let output = entry
            .validate_output(output)
            .map_err(|violation| CallFailure::invalid_output(violation.locations()))?;

        // FILTER_OUTPUT
        Ok(filter(&output, &definition.output_policy))
    }

    /// Reports an execution failure and converts it for the caller.
    fn execution_failed(&self, ctx: &HandlerContext, failure: ExecutionFailure) -> CallFailure {
        self.ops.record(&OpsEvent::ExecutionFailed {
            trace_id: ctx.trace_id.to_string(),
            action: ctx.action.to_string(),
            reason: failure.reason.clone(),
            exit_code: failure.exit_code,
            timed_out: failure.timed_out,
        });
        CallFailure::execution(failure.into_detail())
    }
}
