// crates/callgate-core/src/runtime/schema.rs
// ============================================================================
// Module: Call Gate Schema Validation
// Description: Compiled JSON Schema validators for action input and output.
// Purpose: Reject malformed arguments and outputs with structured field errors.
// Dependencies: jsonschema, serde, serde_json
// ============================================================================

//! ## Overview
//! Schemas are compiled once at registration (draft 2020-12) and reused for
//! every call. The same [`CompiledSchema`] validates arguments before
//! execution and handler output after execution. Violations are collected
//! into a bounded list of [`FieldError`]s.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use jsonschema::Draft;
use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::FieldLocation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum field errors collected for a single validation.
pub const MAX_FIELD_ERRORS: usize = 32;

// ============================================================================
// SECTION: Field Errors
// ============================================================================

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// JSON pointer of the offending value (empty for the root).
    pub path: String,
    /// Validator message describing what was expected.
    pub expected: String,
    /// JSON type of the offending value.
    pub received: String,
}

impl FieldError {
    /// Returns the location without the validator message.
    #[must_use]
    pub fn location(&self) -> FieldLocation {
        FieldLocation {
            path: self.path.clone(),
            received: self.received.clone(),
        }
    }
}

/// Collected schema violations for one value.
///
/// # Invariants
/// - Holds between 1 and [`MAX_FIELD_ERRORS`] errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Field errors in validator order.
    pub errors: Vec<FieldError>,
    /// Whether additional errors were dropped.
    pub truncated: bool,
}

impl SchemaViolation {
    /// Caller-facing detail: every field error including validator messages.
    #[must_use]
    pub fn caller_details(&self) -> Value {
        json!({
            "errors": self.errors,
            "truncated": self.truncated,
        })
    }

    /// Audit-safe view: paths and received types only.
    #[must_use]
    pub fn locations(&self) -> Vec<FieldLocation> {
        self.errors.iter().map(FieldError::location).collect()
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} schema violation(s)", self.errors.len())
    }
}

// ============================================================================
// SECTION: Compiled Schema
// ============================================================================

/// Draft 2020-12 validator compiled at registration time.
pub struct CompiledSchema {
    /// Source schema document.
    source: Value,
    /// Compiled validator.
    validator: Validator,
}

impl CompiledSchema {
    /// Compiles a schema document.
    ///
    /// # Errors
    ///
    /// Returns the compiler message when the schema is invalid.
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(schema)
            .map_err(|err| err.to_string())?;
        Ok(Self {
            source: schema.clone(),
            validator,
        })
    }

    /// Returns the source schema document.
    #[must_use]
    pub const fn source(&self) -> &Value {
        &self.source
    }

    /// Validates a value, handing it back on success.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaViolation`] listing up to [`MAX_FIELD_ERRORS`] errors.
    pub fn validate(&self, value: Value) -> Result<Value, SchemaViolation> {
        let mut errors = Vec::new();
        let mut truncated = false;
        for error in self.validator.iter_errors(&value) {
            if errors.len() == MAX_FIELD_ERRORS {
                truncated = true;
                break;
            }
            let path = error.instance_path().to_string();
            let received = value.pointer(&path).map_or("missing", json_type_name).to_string();
            errors.push(FieldError {
                path,
                expected: error.to_string(),
                received,
            });
        }
        if errors.is_empty() {
            Ok(value)
        } else {
            Err(SchemaViolation {
                errors,
                truncated,
            })
        }
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema").field("source", &self.source).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the JSON type label of a value.
#[must_use]
pub const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
