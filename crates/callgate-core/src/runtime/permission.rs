// crates/callgate-core/src/runtime/permission.rs
// ============================================================================
// Module: Call Gate Permission Engine
// Description: Required-permission computation and subset check.
// Purpose: Decide whether a caller may invoke an action with given input.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! The required set for a call is the action's base permissions, plus
//! [`ALLOW_DESTRUCTIVE`] for destructive actions, plus the elevated set when
//! the elevation rule holds on the raw input. The call is allowed iff the
//! caller holds every required permission.
//!
//! Security posture: elevation predicates fail closed; an evaluation error is
//! treated exactly like a rule that evaluated to true.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;

use crate::core::ActionDefinition;
use crate::core::CallerContext;
use crate::core::Classification;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Permission every destructive action requires.
pub const ALLOW_DESTRUCTIVE: &str = "allow_destructive";

// ============================================================================
// SECTION: Types
// ============================================================================

/// How the elevation rule contributed to the required set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElevationOutcome {
    /// The action has no elevation rule.
    NotConfigured,
    /// The rule evaluated to false.
    NotTriggered,
    /// The rule evaluated to true.
    Triggered,
    /// The rule failed to evaluate; elevation applied.
    PredicateFailed {
        /// Evaluation error message.
        error: String,
    },
}

impl ElevationOutcome {
    /// Returns the audit label for the outcome.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::NotConfigured => "not_configured".to_string(),
            Self::NotTriggered => "not_triggered".to_string(),
            Self::Triggered => "triggered".to_string(),
            Self::PredicateFailed {
                error,
            } => format!("predicate_failed: {error}"),
        }
    }

    /// Returns true when the elevated permissions were added.
    #[must_use]
    pub const fn applied(&self) -> bool {
        matches!(self, Self::Triggered | Self::PredicateFailed { .. })
    }
}

/// Result of a permission check.
///
/// # Invariants
/// - `allowed` iff `missing` is empty.
/// - `missing` is internal only and never returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecision {
    /// Whether the call may proceed.
    pub allowed: bool,
    /// Short reason when denied.
    pub reason: Option<String>,
    /// Every permission the call required.
    pub required: BTreeSet<String>,
    /// Required permissions the caller lacks.
    pub missing: BTreeSet<String>,
    /// Elevation contribution.
    pub elevation: ElevationOutcome,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Stateless permission evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionEngine;

impl PermissionEngine {
    /// Creates a permission engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the required permission set for a call.
    #[must_use]
    pub fn required(
        &self,
        action: &ActionDefinition,
        raw_input: &Value,
    ) -> (BTreeSet<String>, ElevationOutcome) {
        let mut required = action.required_permissions.clone();
        if action.classification == Classification::Destructive {
            required.insert(ALLOW_DESTRUCTIVE.to_string());
        }
        let outcome = match &action.elevation {
            None => ElevationOutcome::NotConfigured,
            Some(elevation) => match elevation.rule.evaluate(raw_input) {
                Ok(true) => ElevationOutcome::Triggered,
                Ok(false) => ElevationOutcome::NotTriggered,
                Err(err) => ElevationOutcome::PredicateFailed {
                    error: err.to_string(),
                },
            },
        };
        if outcome.applied()
            && let Some(elevation) = &action.elevation
        {
            required.extend(elevation.permissions.iter().cloned());
        }
        (required, outcome)
    }

    /// Checks whether the caller may invoke the action with this input.
    #[must_use]
    pub fn check(
        &self,
        caller: &CallerContext,
        action: &ActionDefinition,
        raw_input: &Value,
    ) -> PermissionDecision {
        let (required, elevation) = self.required(action, raw_input);
        let missing: BTreeSet<String> =
            required.difference(&caller.permissions).cloned().collect();
        let allowed = missing.is_empty();
        PermissionDecision {
            allowed,
            reason: (!allowed).then(|| "missing required permissions".to_string()),
            required,
            missing,
            elevation,
        }
    }
}
