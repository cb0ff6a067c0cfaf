// crates/callgate-core/tests/elevation.rs
// ============================================================================
// Module: Elevation Rule Tests
// Description: Predicate kinds, field resolution and configuration parsing.
// ============================================================================
//! ## Overview
//! Validates tagged elevation rules over raw call input.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use callgate_core::ElevationRule;
use callgate_core::PredicateError;
use serde_json::json;

/// Tests field comparisons and missing-field handling.
#[test]
fn field_predicates() {
    let input = json!({"target": {"env": "prod", "replicas": 12}, "tags": ["a", "b"]});

    let equals = ElevationRule::FieldEquals {
        field: "target.env".to_string(),
        value: json!("prod"),
    };
    assert!(equals.evaluate(&input).unwrap());

    let within = ElevationRule::FieldIn {
        field: "target.env".to_string(),
        values: vec![json!("staging"), json!("dev")],
    };
    assert!(!within.evaluate(&input).unwrap());

    let present = ElevationRule::FieldPresent {
        field: "tags.1".to_string(),
    };
    assert!(present.evaluate(&input).unwrap());

    let missing = ElevationRule::FieldPresent {
        field: "target.region".to_string(),
    };
    assert!(!missing.evaluate(&input).unwrap());

    let above = ElevationRule::NumberAbove {
        field: "target.replicas".to_string(),
        threshold: 10.0,
    };
    assert!(above.evaluate(&input).unwrap());

    let prefix = ElevationRule::StringPrefix {
        field: "target.env".to_string(),
        prefix: "pr".to_string(),
    };
    assert!(prefix.evaluate(&input).unwrap());
}

/// Tests type mismatches are errors rather than false.
#[test]
fn type_mismatch_is_error() {
    let input = json!({"count": "many", "name": "x"});
    let above = ElevationRule::NumberAbove {
        field: "count".to_string(),
        threshold: 1.0,
    };
    assert_eq!(
        above.evaluate(&input).unwrap_err(),
        PredicateError::TypeMismatch {
            field: "count".to_string(),
            expected: "a number",
        }
    );

    let through_scalar = ElevationRule::FieldPresent {
        field: "name.first".to_string(),
    };
    assert!(through_scalar.evaluate(&input).is_err());
}

/// Tests combinators and their error handling.
#[test]
fn combinators() {
    let input = json!({"force": true, "count": "bad"});
    let force = ElevationRule::FieldEquals {
        field: "force".to_string(),
        value: json!(true),
    };
    let broken = ElevationRule::NumberAbove {
        field: "count".to_string(),
        threshold: 0.0,
    };

    let any = ElevationRule::Any {
        rules: vec![broken.clone(), force.clone()],
    };
    assert!(any.evaluate(&input).unwrap());

    let all = ElevationRule::All {
        rules: vec![force.clone(), broken],
    };
    assert!(all.evaluate(&input).is_err());

    let not = ElevationRule::Not {
        rule: Box::new(force),
    };
    assert!(!not.evaluate(&input).unwrap());
}

/// Tests rules load from tagged configuration.
#[test]
fn rules_deserialize_from_tags() {
    let rule: ElevationRule = serde_json::from_value(json!({
        "kind": "any",
        "rules": [
            {"kind": "field_equals", "field": "force", "value": true},
            {"kind": "number_above", "field": "count", "threshold": 100}
        ]
    }))
    .unwrap();
    assert!(rule.evaluate(&json!({"count": 101})).unwrap());
    assert!(!rule.evaluate(&json!({"count": 5})).unwrap());

    let unknown = serde_json::from_value::<ElevationRule>(json!({"kind": "custom"}));
    assert!(unknown.is_err());
}
