// crates/callgate-gateway/src/lib.rs
// ============================================================================
// Module: Call Gate Gateway Library
// Description: Proxy engine, audit logging, credentials and handlers.
// Purpose: Run governed calls end to end over a validated catalog.
// Dependencies: callgate-core, callgate-config, tokio
// ============================================================================

//! ## Overview
//! The gateway crate turns a catalog into a running [`ProxyEngine`]. Calls
//! are verified, checked, validated, executed under a deadline, validated
//! again and filtered before anything is returned. Every call attempt yields
//! exactly one audit entry; operational failures go to an [`OpsSink`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod capabilities;
pub mod command;
pub mod engine;
pub mod handler;
pub mod ops;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditCapture;
pub use audit::AuditError;
pub use audit::AuditLogger;
pub use audit::AuditWriter;
pub use audit::DailyFileAuditWriter;
pub use audit::MemoryAuditWriter;
pub use audit::StderrAuditWriter;
pub use auth::AuthError;
pub use auth::Credential;
pub use auth::CredentialVerifier;
pub use auth::DefaultCredentialVerifier;
pub use auth::DenyAllVerifier;
pub use auth::MAX_TOKEN_BYTES;
pub use auth::TokenClaims;
pub use capabilities::ActionDescriptor;
pub use command::CommandHandler;
pub use command::TransformFn;
pub use command::TransformSet;
pub use command::build_argv;
pub use command::parse_output;
pub use command::strip_control_sequences;
pub use engine::BuildError;
pub use engine::DEFAULT_CALL_TIMEOUT;
pub use engine::ProxyEngine;
pub use engine::ProxyEngineBuilder;
pub use handler::ActionHandler;
pub use handler::ExecutionFailure;
pub use handler::FnHandler;
pub use handler::HandlerContext;
pub use handler::HandlerSet;
pub use ops::MemoryOpsSink;
pub use ops::NoopOpsSink;
pub use ops::OpsEvent;
pub use ops::OpsSink;
pub use ops::TracingOpsSink;
