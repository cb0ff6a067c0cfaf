// crates/callgate-gateway/tests/common/mod.rs
// ============================================================================
// Module: Gateway Test Support
// Description: Engine fixtures, recording handlers and token signing.
// ============================================================================
//! ## Overview
//! Shared helpers for gateway integration tests.

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures use unwrap for clarity."
)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use callgate_core::ActionDefinition;
use callgate_core::ActionRegistry;
use callgate_core::AuditEntry;
use callgate_gateway::ActionHandler;
use callgate_gateway::AuditError;
use callgate_gateway::AuditLogger;
use callgate_gateway::AuditWriter;
use callgate_gateway::ExecutionFailure;
use callgate_gateway::HandlerContext;
use callgate_gateway::MemoryAuditWriter;
use callgate_gateway::MemoryOpsSink;
use callgate_gateway::OpsSink;
use callgate_gateway::ProxyEngine;
use callgate_gateway::ProxyEngineBuilder;
use callgate_gateway::TokenClaims;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use serde_json::Value;

/// Seed of the signing key used by token tests.
pub const SIGNING_SEED: [u8; 32] = [7; 32];

/// Handler returning a fixed value and counting invocations.
pub struct StaticHandler {
    /// Value returned on every call.
    pub output: Value,
    /// Number of executions.
    pub calls: AtomicUsize,
}

impl StaticHandler {
    /// Creates a handler returning `output`.
    pub fn new(output: Value) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: AtomicUsize::new(0),
        })
    }

    /// Returns how often the handler ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for StaticHandler {
    async fn execute(&self, _input: &Value, _ctx: &HandlerContext) -> Result<Value, ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Handler that echoes its validated input.
pub struct EchoHandler;

#[async_trait]
impl ActionHandler for EchoHandler {
    async fn execute(&self, input: &Value, _ctx: &HandlerContext) -> Result<Value, ExecutionFailure> {
        Ok(input.clone())
    }
}

/// Audit writer that always fails.
pub struct FailingWriter;

impl AuditWriter for FailingWriter {
    fn write(&mut self, _entry: &AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Io("disk full".to_string()))
    }
}

/// Engine under test plus its observation points.
pub struct Harness {
    /// Engine.
    pub engine: ProxyEngine,
    /// Audit entries written.
    pub audit: MemoryAuditWriter,
    /// Ops events recorded.
    pub ops: Arc<MemoryOpsSink>,
}

impl Harness {
    /// Flushes audit and returns every entry written so far.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.engine.flush_audit().await.unwrap();
        self.audit.entries()
    }
}

/// Builds a registry from definitions.
pub fn registry(definitions: Vec<ActionDefinition>) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    for definition in definitions {
        registry.register(definition).unwrap();
    }
    registry
}

/// Starts a builder with in-memory audit and ops sinks.
pub fn builder(
    definitions: Vec<ActionDefinition>,
) -> (ProxyEngineBuilder, MemoryAuditWriter, Arc<MemoryOpsSink>) {
    let audit = MemoryAuditWriter::new();
    let ops = Arc::new(MemoryOpsSink::new());
    let sink: Arc<dyn OpsSink> = ops.clone();
    let logger = AuditLogger::new(Box::new(audit.clone()), 64, Arc::clone(&sink)).unwrap();
    let builder = ProxyEngineBuilder::new(registry(definitions), logger).ops(sink);
    (builder, audit, ops)
}

/// Builds a harness with one named handler.
pub fn harness(
    definitions: Vec<ActionDefinition>,
    name: &str,
    handler: Arc<dyn ActionHandler>,
) -> Harness {
    let (builder, audit, ops) = builder(definitions);
    let engine = builder.handler(name, handler).build().unwrap();
    Harness {
        engine,
        audit,
        ops,
    }
}

/// Returns the token signing key.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&SIGNING_SEED)
}

/// Returns the verifying key as standard base64.
pub fn public_key_b64() -> String {
    STANDARD.encode(signing_key().verifying_key().to_bytes())
}

/// Signs claims into a token.
pub fn sign_token(claims: &TokenClaims) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    let signature = signing_key().sign(encoded.as_bytes());
    format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}
