// crates/callgate-core/src/runtime/mod.rs
// ============================================================================
// Module: Call Gate Runtime
// Description: Registry, permission, schema and output policy evaluation.
// Purpose: Provide the pure, synchronous decision steps of the call pipeline.
// Dependencies: crate::core, jsonschema
// ============================================================================

//! ## Overview
//! Runtime modules implement each gate of the call pipeline as a pure
//! function over core types. Sequencing, execution and audit dispatch live in
//! the gateway crate; everything here is deterministic and free of I/O.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod filter;
pub mod permission;
pub mod registry;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use filter::FilterOutcome;
pub use filter::MASK_TOKEN;
pub use filter::filter;
pub use filter::mask_string;
pub use permission::ALLOW_DESTRUCTIVE;
pub use permission::ElevationOutcome;
pub use permission::PermissionDecision;
pub use permission::PermissionEngine;
pub use registry::ActionRegistry;
pub use registry::RegisteredAction;
pub use registry::RegistryError;
pub use schema::CompiledSchema;
pub use schema::FieldError;
pub use schema::MAX_FIELD_ERRORS;
pub use schema::SchemaViolation;
pub use schema::json_type_name;
