// crates/callgate-core/src/core/mod.rs
// ============================================================================
// Module: Call Gate Core Types
// Description: Canonical action, caller, result and audit structures.
// Purpose: Provide stable, serializable types shared by every gateway layer.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Core types define action definitions, caller identity, output policies,
//! call results and audit entries. They are the canonical source of truth for
//! configuration loading, the engine and any transport built on top.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod action;
pub mod audit;
pub mod caller;
pub mod command;
pub mod elevation;
pub mod hashing;
pub mod identifiers;
pub mod output_policy;
pub mod result;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use action::ActionDefinition;
pub use action::Classification;
pub use action::Elevation;
pub use action::HandlerRef;
pub use audit::ActionSnapshot;
pub use audit::AuditEntry;
pub use audit::Decision;
pub use audit::Denial;
pub use audit::ResponseMeta;
pub use caller::ANONYMOUS_SUBJECT;
pub use caller::CallerContext;
pub use caller::CallerSnapshot;
pub use command::ArgTemplate;
pub use command::CaptureStreams;
pub use command::CommandSpec;
pub use command::DEFAULT_MAX_OUTPUT_BYTES;
pub use command::OutputFormat;
pub use elevation::CustomPredicate;
pub use elevation::ElevationRule;
pub use elevation::PredicateError;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::fingerprint_json;
pub use identifiers::ActionName;
pub use identifiers::TraceId;
pub use output_policy::FieldAction;
pub use output_policy::OutputPolicy;
pub use output_policy::PathPattern;
pub use output_policy::PathStep;
pub use output_policy::PolicyError;
pub use output_policy::PolicyRule;
pub use output_policy::RuleMatch;
pub use result::CallFailure;
pub use result::CallResult;
pub use result::ErrorCode;
pub use result::FieldLocation;
pub use result::InternalDetail;
pub use result::Stage;
