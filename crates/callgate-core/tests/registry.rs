// crates/callgate-core/tests/registry.rs
// ============================================================================
// Module: Action Registry Tests
// Description: Registration, lookup and listing behavior.
// ============================================================================
//! ## Overview
//! Validates that the registry rejects duplicates and invalid schemas and
//! preserves registration order.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use callgate_core::ActionDefinition;
use callgate_core::ActionRegistry;
use callgate_core::Classification;
use callgate_core::HandlerRef;
use callgate_core::RegistryError;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a minimal read action.
fn action(name: &str) -> ActionDefinition {
    ActionDefinition::new(name, Classification::Read, HandlerRef::named("noop"))
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Tests get after register returns a structurally equal definition.
#[test]
fn get_returns_registered_definition() {
    let mut registry = ActionRegistry::new();
    let definition = action("inventory.lookup")
        .with_description("Look up stock levels")
        .with_required(["inventory.read"]);
    registry.register(definition.clone()).unwrap();

    assert_eq!(registry.get("inventory.lookup"), Some(&definition));
    assert!(registry.get("inventory.missing").is_none());
}

/// Tests duplicate names are rejected and the original is kept.
#[test]
fn duplicate_name_is_rejected() {
    let mut registry = ActionRegistry::new();
    registry.register(action("dup").with_description("first")).unwrap();
    let err = registry.register(action("dup").with_description("second")).unwrap_err();

    assert_eq!(err, RegistryError::DuplicateName("dup".to_string()));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("dup").unwrap().description, "first");
}

/// Tests empty names are rejected.
#[test]
fn empty_name_is_rejected() {
    let mut registry = ActionRegistry::new();
    let err = registry.register(action("  ")).unwrap_err();
    assert_eq!(err, RegistryError::InvalidName);
    assert!(registry.is_empty());
}

/// Tests schemas that fail to compile are rejected at registration.
#[test]
fn invalid_schema_is_rejected() {
    let mut registry = ActionRegistry::new();
    let definition = action("broken").with_schemas(json!({"type": 12}), json!({}));
    let err = registry.register(definition).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidSchema {
            which: "input",
            ..
        }
    ));

    let definition = action("broken_out").with_schemas(json!({}), json!({"minimum": "zero"}));
    let err = registry.register(definition).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidSchema {
            which: "output",
            ..
        }
    ));
    assert!(registry.is_empty());
}

// ============================================================================
// SECTION: Listing
// ============================================================================

/// Tests list returns every entry in registration order.
#[test]
fn list_preserves_registration_order() {
    let mut registry = ActionRegistry::new();
    let names = ["zeta", "alpha", "mid", "beta"];
    for name in names {
        registry.register(action(name)).unwrap();
    }
    let listed: Vec<&str> = registry.list().map(|definition| definition.name.as_str()).collect();
    assert_eq!(listed, names);
    assert_eq!(registry.len(), names.len());
}

/// Tests the compiled schemas are reachable through the entry.
#[test]
fn entry_exposes_compiled_schemas() {
    let mut registry = ActionRegistry::new();
    let input = json!({"type": "object", "required": ["sku"]});
    registry.register(action("lookup").with_schemas(input.clone(), json!({}))).unwrap();

    let entry = registry.entry("lookup").unwrap();
    assert_eq!(entry.input_schema().source(), &input);
    assert!(entry.input_schema().validate(json!({})).is_err());
    assert!(entry.output_schema().validate(json!("anything")).is_ok());
}

/// Tests input and output validation run against their own schemas.
#[test]
fn entry_validates_input_and_output_separately() {
    let mut registry = ActionRegistry::new();
    let input = json!({"type": "object", "properties": {"lines": {"type": "integer"}}});
    let output = json!({"type": "array"});
    registry.register(action("tail").with_schemas(input, output)).unwrap();

    let entry = registry.entry("tail").unwrap();
    assert_eq!(entry.validate_input(json!({"lines": 5})).unwrap(), json!({"lines": 5}));
    let violation = entry.validate_input(json!({"lines": "five"})).unwrap_err();
    assert_eq!(violation.errors[0].path, "/lines");
    assert_eq!(violation.errors[0].received, "string");
    assert!(entry.validate_output(json!([])).is_ok());
    assert!(entry.validate_output(json!({})).is_err());
}
