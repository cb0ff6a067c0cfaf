// crates/callgate-core/src/core/action.rs
// ============================================================================
// Module: Call Gate Action Definitions
// Description: Declared, bounded operations exposed to callers.
// Purpose: Describe everything the gateway needs to govern one action.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`ActionDefinition`] fixes an action's identity, schemas, permission
//! requirements, output policy and handler at registration time. Definitions
//! are owned by the registry and never mutated afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::command::CommandSpec;
use crate::core::elevation::ElevationRule;
use crate::core::identifiers::ActionName;
use crate::core::output_policy::OutputPolicy;

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Impact classification gating extra permission requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Observes state without changing it.
    Read,
    /// Changes state in a recoverable way.
    Write,
    /// Changes state irreversibly; always requires `allow_destructive`.
    Destructive,
}

impl Classification {
    /// Returns the stable label for the classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Destructive => "destructive",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Handler Reference
// ============================================================================

/// How an action is executed once every gate has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerRef {
    /// Bounded local execution of a fixed command.
    Command(CommandSpec),
    /// Handler registered in code under a name.
    Named {
        /// Registered handler name.
        name: String,
    },
}

impl HandlerRef {
    /// Creates a reference to a named handler.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
        }
    }
}

// ============================================================================
// SECTION: Elevation
// ============================================================================

/// Extra permissions demanded when a rule over the input holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Elevation {
    /// Predicate deciding whether elevation applies.
    pub rule: ElevationRule,
    /// Permissions added to the required set when elevated.
    pub permissions: BTreeSet<String>,
}

// ============================================================================
// SECTION: Action Definition
// ============================================================================

/// Immutable description of one governed action.
///
/// # Invariants
/// - `name` is unique within a registry.
/// - Never mutated after registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDefinition {
    /// Unique, stable action name.
    pub name: ActionName,
    /// Human description presented during capability discovery.
    pub description: String,
    /// Impact classification.
    pub classification: Classification,
    /// JSON Schema (draft 2020-12) for call arguments.
    pub input_schema: Value,
    /// JSON Schema (draft 2020-12) for handler output.
    pub output_schema: Value,
    /// Base permissions required for every call.
    pub required_permissions: BTreeSet<String>,
    /// Optional input-dependent elevation.
    pub elevation: Option<Elevation>,
    /// Field-path policy applied to produced output.
    pub output_policy: OutputPolicy,
    /// Execution strategy.
    pub handler: HandlerRef,
    /// Top-level input fields treated as sensitive in debug capture.
    pub sensitive_inputs: BTreeSet<String>,
    /// Per-action timeout; the engine default applies when unset.
    pub timeout: Option<Duration>,
}

impl ActionDefinition {
    /// Creates a definition with permissive schemas and an empty policy.
    ///
    /// An empty output policy strips every field (default deny).
    #[must_use]
    pub fn new(
        name: impl Into<ActionName>,
        classification: Classification,
        handler: HandlerRef,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            classification,
            input_schema: json!({"type": "object"}),
            output_schema: json!({}),
            required_permissions: BTreeSet::new(),
            elevation: None,
            output_policy: OutputPolicy::default(),
            handler,
            sensitive_inputs: BTreeSet::new(),
            timeout: None,
        }
    }

    /// Returns a copy with the description set.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns a copy with both schemas set.
    #[must_use]
    pub fn with_schemas(mut self, input_schema: Value, output_schema: Value) -> Self {
        self.input_schema = input_schema;
        self.output_schema = output_schema;
        self
    }

    /// Returns a copy with the base permission set replaced.
    #[must_use]
    pub fn with_required<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with an elevation rule and its permissions.
    #[must_use]
    pub fn with_elevation<I, S>(mut self, rule: ElevationRule, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elevation = Some(Elevation {
            rule,
            permissions: permissions.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Returns a copy with the output policy replaced.
    #[must_use]
    pub fn with_output_policy(mut self, policy: OutputPolicy) -> Self {
        self.output_policy = policy;
        self
    }

    /// Returns a copy with the sensitive input fields replaced.
    #[must_use]
    pub fn with_sensitive_inputs<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_inputs = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with a per-action timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
