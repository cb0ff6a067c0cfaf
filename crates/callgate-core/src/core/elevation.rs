// crates/callgate-core/src/core/elevation.rs
// ============================================================================
// Module: Call Gate Elevation Rules
// Description: Predicates over call input that demand elevated permissions.
// Purpose: Express "this call needs more than the base grant" declaratively.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! An [`ElevationRule`] is a small, closed set of tagged predicate kinds that can
//! be loaded from configuration, plus a [`CustomPredicate`] escape hatch for
//! rules registered in code. Evaluation returns `Result<bool, _>`; callers
//! must treat an error as "elevation required".
//!
//! Field references are dotted paths (`options.force`, `targets.0.host`).
//! A missing field evaluates to `false`. Traversing through a scalar or
//! comparing against a value of the wrong type is an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while evaluating an elevation predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// A referenced field had an unexpected JSON type.
    #[error("field {field} is not {expected}")]
    TypeMismatch {
        /// Field path that failed.
        field: String,
        /// Expected JSON type label.
        expected: &'static str,
    },
    /// A custom predicate reported a failure.
    #[error("predicate {name} failed: {message}")]
    Custom {
        /// Predicate name.
        name: String,
        /// Failure message.
        message: String,
    },
}

// ============================================================================
// SECTION: Custom Predicates
// ============================================================================

/// Signature for predicates registered in code.
pub type PredicateFn = dyn Fn(&Value) -> Result<bool, PredicateError> + Send + Sync;

/// Named, injected elevation predicate.
///
/// # Invariants
/// - Equality is by name; two predicates with the same name are the same rule.
#[derive(Clone)]
pub struct CustomPredicate {
    /// Stable predicate name (recorded in audit detail).
    name: String,
    /// Predicate implementation.
    func: Arc<PredicateFn>,
}

impl CustomPredicate {
    /// Creates a named predicate from a pure function.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Returns the predicate name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate").field("name", &self.name).finish_non_exhaustive()
    }
}

impl PartialEq for CustomPredicate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// ============================================================================
// SECTION: Elevation Rules
// ============================================================================

/// Predicate over raw call input deciding whether elevated permissions apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElevationRule {
    /// Field equals a JSON value.
    FieldEquals {
        /// Dotted field path.
        field: String,
        /// Value to compare against.
        value: Value,
    },
    /// Field equals one of the listed values.
    FieldIn {
        /// Dotted field path.
        field: String,
        /// Candidate values.
        values: Vec<Value>,
    },
    /// Field is present and not null.
    FieldPresent {
        /// Dotted field path.
        field: String,
    },
    /// Numeric field is strictly greater than a threshold.
    NumberAbove {
        /// Dotted field path.
        field: String,
        /// Exclusive lower bound.
        threshold: f64,
    },
    /// String field starts with a prefix.
    StringPrefix {
        /// Dotted field path.
        field: String,
        /// Required prefix.
        prefix: String,
    },
    /// True when any nested rule is true.
    Any {
        /// Nested rules.
        rules: Vec<ElevationRule>,
    },
    /// True when every nested rule is true.
    All {
        /// Nested rules.
        rules: Vec<ElevationRule>,
    },
    /// Negation of a nested rule.
    Not {
        /// Nested rule.
        rule: Box<ElevationRule>,
    },
    /// Predicate injected in code (not loadable from configuration).
    #[serde(skip)]
    Custom(CustomPredicate),
}

impl ElevationRule {
    /// Evaluates the rule against raw call input.
    ///
    /// # Errors
    ///
    /// Returns [`PredicateError`] when a referenced field has the wrong type or
    /// a custom predicate fails. Callers must treat errors as "elevation
    /// required".
    pub fn evaluate(&self, input: &Value) -> Result<bool, PredicateError> {
        match self {
            Self::FieldEquals {
                field,
                value,
            } => Ok(resolve_field(input, field)?.is_some_and(|found| found == value)),
            Self::FieldIn {
                field,
                values,
            } => Ok(resolve_field(input, field)?.is_some_and(|found| values.contains(found))),
            Self::FieldPresent {
                field,
            } => Ok(resolve_field(input, field)?.is_some_and(|found| !found.is_null())),
            Self::NumberAbove {
                field,
                threshold,
            } => match resolve_field(input, field)? {
                None => Ok(false),
                Some(found) => found.as_f64().map(|number| number > *threshold).ok_or_else(|| {
                    PredicateError::TypeMismatch {
                        field: field.clone(),
                        expected: "a number",
                    }
                }),
            },
            Self::StringPrefix {
                field,
                prefix,
            } => match resolve_field(input, field)? {
                None => Ok(false),
                Some(found) => found
                    .as_str()
                    .map(|text| text.starts_with(prefix.as_str()))
                    .ok_or_else(|| PredicateError::TypeMismatch {
                        field: field.clone(),
                        expected: "a string",
                    }),
            },
            Self::Any {
                rules,
            } => evaluate_any(rules, input),
            Self::All {
                rules,
            } => evaluate_all(rules, input),
            Self::Not {
                rule,
            } => rule.evaluate(input).map(|result| !result),
            Self::Custom(predicate) => (predicate.func)(input),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Any-of: a definite `true` wins, otherwise the first error propagates.
fn evaluate_any(rules: &[ElevationRule], input: &Value) -> Result<bool, PredicateError> {
    let mut first_error = None;
    for rule in rules {
        match rule.evaluate(input) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    first_error.map_or(Ok(false), Err)
}

/// All-of: a definite `false` wins, otherwise the first error propagates.
fn evaluate_all(rules: &[ElevationRule], input: &Value) -> Result<bool, PredicateError> {
    let mut first_error = None;
    for rule in rules {
        match rule.evaluate(input) {
            Ok(false) => return Ok(false),
            Ok(true) => {}
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    first_error.map_or(Ok(true), Err)
}

/// Resolves a dotted field path; `Ok(None)` when a key is absent.
fn resolve_field<'a>(input: &'a Value, field: &str) -> Result<Option<&'a Value>, PredicateError> {
    let mut current = input;
    for segment in field.split('.').filter(|segment| !segment.is_empty()) {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => next,
                None => return Ok(None),
            },
            Value::Array(items) => {
                let index = segment.parse::<usize>().map_err(|_| PredicateError::TypeMismatch {
                    field: field.to_string(),
                    expected: "an object",
                })?;
                match items.get(index) {
                    Some(next) => next,
                    None => return Ok(None),
                }
            }
            _ => {
                return Err(PredicateError::TypeMismatch {
                    field: field.to_string(),
                    expected: "an object",
                });
            }
        };
    }
    Ok(Some(current))
}
