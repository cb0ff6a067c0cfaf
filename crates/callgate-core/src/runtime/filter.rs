// crates/callgate-core/src/runtime/filter.rs
// ============================================================================
// Module: Call Gate Output Filter
// Description: Default-deny application of an output policy to a value.
// Purpose: Expose only the allowed or masked subset of handler output.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! [`filter`] walks the output depth-first, resolving the effective action of
//! every node. A node's own rule wins unless it is the bare catch-all, in
//! which case a rule inherited from an ancestor takes precedence. The
//! catch-all never binds a container as a whole: it is the fallback for each
//! node no other rule covers, so `{"*": "redact", ".a": "allow"}` keeps `.a`.
//! Leaves with no effective action are stripped silently. Masked and redacted locations
//! are reported as rendered paths; their values never leave this module.
//!
//! Filtering cannot fail. The root is always returned, emptied if necessary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::FieldAction;
use crate::core::OutputPolicy;
use crate::core::PathStep;
use crate::core::RuleMatch;
use crate::core::output_policy::render_path;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed interior used for masked values.
pub const MASK_TOKEN: &str = "****";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Filtered output and the locations the policy altered.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Value safe to return to the caller.
    pub filtered: Value,
    /// Masked or redacted paths in traversal order.
    pub touched_paths: Vec<String>,
}

// ============================================================================
// SECTION: Filtering
// ============================================================================

/// Applies `policy` to `value`.
#[must_use]
pub fn filter(value: &Value, policy: &OutputPolicy) -> FilterOutcome {
    let mut walker = Walker {
        policy,
        path: Vec::new(),
        touched: Vec::new(),
    };
    let filtered = walker.visit(value, None).unwrap_or_else(|| empty_like(value));
    FilterOutcome {
        filtered,
        touched_paths: walker.touched,
    }
}

/// Masks a string: first char, [`MASK_TOKEN`], last char.
///
/// Returns `None` when the string is too short to mask without revealing it.
#[must_use]
pub fn mask_string(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    if chars.next().is_none() {
        return None;
    }
    let mut masked = String::with_capacity(MASK_TOKEN.len() + 8);
    masked.push(first);
    masked.push_str(MASK_TOKEN);
    masked.push(last);
    Some(masked)
}

/// Depth-first traversal state.
struct Walker<'a> {
    /// Policy being applied.
    policy: &'a OutputPolicy,
    /// Current location.
    path: Vec<PathStep>,
    /// Touched locations collected so far.
    touched: Vec<String>,
}

impl Walker<'_> {
    /// Filters one node; `None` removes it from its parent.
    fn visit(&mut self, value: &Value, inherited: Option<FieldAction>) -> Option<Value> {
        let effective = effective_action(self.policy.resolve(&self.path), inherited);
        let action = effective.map(|found| found.action);
        // The catch-all never binds a subtree; descendants resolve it again.
        let binding = effective.filter(|found| !found.fallback).map(|found| found.action);
        match (binding, value) {
            (Some(FieldAction::Redact), _) => {
                self.touch();
                None
            }
            (_, Value::Object(map)) => {
                let mut kept = Map::new();
                for (key, child) in map {
                    self.path.push(PathStep::Key(key.clone()));
                    if let Some(filtered) = self.visit(child, binding) {
                        kept.insert(key.clone(), filtered);
                    }
                    self.path.pop();
                }
                keep_container(action, kept.is_empty()).then_some(Value::Object(kept))
            }
            (_, Value::Array(items)) => {
                let mut kept = Vec::new();
                for (index, child) in items.iter().enumerate() {
                    self.path.push(PathStep::Index(index));
                    if let Some(filtered) = self.visit(child, binding) {
                        kept.push(filtered);
                    }
                    self.path.pop();
                }
                keep_container(action, kept.is_empty()).then_some(Value::Array(kept))
            }
            (_, leaf) => self.visit_leaf(leaf, action),
        }
    }

    /// Applies the effective action to a scalar.
    fn visit_leaf(&mut self, leaf: &Value, action: Option<FieldAction>) -> Option<Value> {
        match action {
            Some(FieldAction::Allow) => Some(leaf.clone()),
            Some(FieldAction::Mask) => self.mask_leaf(leaf),
            Some(FieldAction::Redact) => {
                self.touch();
                None
            }
            None => None,
        }
    }

    /// Masks a scalar, redacting values too short to mask.
    fn mask_leaf(&mut self, leaf: &Value) -> Option<Value> {
        let text = match leaf {
            Value::Null => return Some(Value::Null),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        self.touch();
        mask_string(&text).map(Value::String)
    }

    /// Records the current location as touched.
    fn touch(&mut self) {
        self.touched.push(render_path(&self.path));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Action applied at one node.
#[derive(Clone, Copy)]
struct Effective {
    /// Winning action.
    action: FieldAction,
    /// True when only the catch-all applies.
    fallback: bool,
}

/// Combines a node's own winning rule with the action inherited from above.
fn effective_action(
    direct: Option<RuleMatch>,
    inherited: Option<FieldAction>,
) -> Option<Effective> {
    match (direct, inherited) {
        (Some(found), _) if !found.catch_all => Some(Effective {
            action: found.action,
            fallback: false,
        }),
        (_, Some(action)) => Some(Effective {
            action,
            fallback: false,
        }),
        (found, None) => found.map(|found| Effective {
            action: found.action,
            fallback: true,
        }),
    }
}

/// Keeps a container that still has children or is allowed or masked as a whole.
fn keep_container(action: Option<FieldAction>, emptied: bool) -> bool {
    !emptied || matches!(action, Some(FieldAction::Allow | FieldAction::Mask))
}

/// Empty value of the same shape, used when the root itself is removed.
fn empty_like(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::Object(Map::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}
