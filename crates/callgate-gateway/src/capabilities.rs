// crates/callgate-gateway/src/capabilities.rs
// ============================================================================
// Module: Call Gate Capability Discovery
// Description: Caller-facing descriptors of registered actions.
// Purpose: Advertise what may be called without exposing governance detail.
// Dependencies: callgate-core, serde
// ============================================================================

//! ## Overview
//! Descriptors carry the name, description and input schema only. Required
//! permissions, output policies and handler wiring stay internal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use callgate_core::ActionDefinition;
use callgate_core::ActionRegistry;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Capability descriptor for one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Input JSON Schema.
    pub input_schema: Value,
}

impl From<&ActionDefinition> for ActionDescriptor {
    fn from(definition: &ActionDefinition) -> Self {
        Self {
            name: definition.name.to_string(),
            description: definition.description.clone(),
            input_schema: definition.input_schema.clone(),
        }
    }
}

/// Lists descriptors in registration order.
#[must_use]
pub fn describe(registry: &ActionRegistry) -> Vec<ActionDescriptor> {
    registry.list().map(ActionDescriptor::from).collect()
}
