// crates/callgate-core/src/lib.rs
// ============================================================================
// Module: Call Gate Core Library
// Description: Public API surface for the Call Gate core.
// Purpose: Expose core types and the pure pipeline gates.
// Dependencies: crate::{core, runtime}
// ============================================================================

//! ## Overview
//! Call Gate core holds the data model of a call-governance gateway and the
//! deterministic gates every call passes through: registry lookup,
//! permission evaluation, schema validation and output filtering. It performs
//! no I/O and is shared by configuration loading and the gateway engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use runtime::ActionRegistry;
pub use runtime::CompiledSchema;
pub use runtime::ElevationOutcome;
pub use runtime::FieldError;
pub use runtime::FilterOutcome;
pub use runtime::PermissionDecision;
pub use runtime::PermissionEngine;
pub use runtime::RegisteredAction;
pub use runtime::RegistryError;
pub use runtime::SchemaViolation;
pub use runtime::filter;
