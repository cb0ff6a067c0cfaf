// crates/callgate-core/src/runtime/registry.rs
// ============================================================================
// Module: Call Gate Action Registry
// Description: Immutable catalog of declared actions and compiled schemas.
// Purpose: Own action definitions and answer lookups for the engine.
// Dependencies: crate::core, crate::runtime::schema, thiserror
// ============================================================================

//! ## Overview
//! The registry is built once before the engine starts and is read-only
//! afterwards. Registration compiles both schemas so that malformed catalogs
//! fail at startup rather than on first call. There is no deregistration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::ActionDefinition;
use crate::core::ActionName;
use crate::runtime::schema::CompiledSchema;
use crate::runtime::schema::SchemaViolation;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An action with the same name is already registered.
    #[error("action {0} is already registered")]
    DuplicateName(String),
    /// The action name is empty.
    #[error("action name must not be empty")]
    InvalidName,
    /// The input or output schema failed to compile.
    #[error("action {action} has an invalid {which} schema: {message}")]
    InvalidSchema {
        /// Action name.
        action: String,
        /// `input` or `output`.
        which: &'static str,
        /// Compiler message.
        message: String,
    },
}

// ============================================================================
// SECTION: Registered Action
// ============================================================================

/// Definition plus its compiled validators.
#[derive(Debug)]
pub struct RegisteredAction {
    /// Frozen definition.
    definition: ActionDefinition,
    /// Compiled input schema.
    input: CompiledSchema,
    /// Compiled output schema.
    output: CompiledSchema,
}

impl RegisteredAction {
    /// Returns the definition.
    #[must_use]
    pub const fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    /// Returns the compiled input schema.
    #[must_use]
    pub const fn input_schema(&self) -> &CompiledSchema {
        &self.input
    }

    /// Returns the compiled output schema.
    #[must_use]
    pub const fn output_schema(&self) -> &CompiledSchema {
        &self.output
    }

    /// Validates raw call arguments against the input schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaViolation`] when the arguments do not conform.
    pub fn validate_input(&self, raw: Value) -> Result<Value, SchemaViolation> {
        self.input.validate(raw)
    }

    /// Validates handler output against the output schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaViolation`] when the output does not conform.
    pub fn validate_output(&self, output: Value) -> Result<Value, SchemaViolation> {
        self.output.validate(output)
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Catalog of registered actions in registration order.
///
/// # Invariants
/// - Names are unique.
/// - `index` maps each name to its position in `entries`.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    /// Registered actions in registration order.
    entries: Vec<RegisteredAction>,
    /// Name to position lookup.
    index: BTreeMap<ActionName, usize>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action, compiling its schemas.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for an empty or duplicate name or an invalid
    /// schema.
    pub fn register(&mut self, definition: ActionDefinition) -> Result<(), RegistryError> {
        if definition.name.as_str().trim().is_empty() {
            return Err(RegistryError::InvalidName);
        }
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateName(definition.name.to_string()));
        }
        let compile = |which: &'static str, schema| {
            CompiledSchema::compile(schema).map_err(|message| RegistryError::InvalidSchema {
                action: definition.name.to_string(),
                which,
                message,
            })
        };
        let input = compile("input", &definition.input_schema)?;
        let output = compile("output", &definition.output_schema)?;
        self.index.insert(definition.name.clone(), self.entries.len());
        self.entries.push(RegisteredAction {
            definition,
            input,
            output,
        });
        Ok(())
    }

    /// Returns the definition registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActionDefinition> {
        self.entry(name).map(RegisteredAction::definition)
    }

    /// Returns the registered entry, including compiled schemas.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&RegisteredAction> {
        self.index.get(name).and_then(|position| self.entries.get(*position))
    }

    /// Returns every definition in registration order.
    pub fn list(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.entries.iter().map(RegisteredAction::definition)
    }

    /// Returns the number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
