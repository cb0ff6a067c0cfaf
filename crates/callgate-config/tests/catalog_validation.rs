// crates/callgate-config/tests/catalog_validation.rs
// =============================================================================
// Module: Catalog Validation Tests
// Description: Fail-closed validation of actions, auth and execution limits.
// =============================================================================
//! ## Overview
//! Validates cross-field rules: unique names, executable allow-listing,
//! timeout overrides, elevation pairing and key material.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::time::Duration;

use callgate_config::ConfigError;
use callgate_core::HandlerRef;
use common::ZERO_KEY_B64;
use common::assert_invalid;
use common::config_from_toml;
use common::named_action_toml;

mod common;

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Tests duplicate action names are rejected.
#[test]
fn duplicate_action_names_are_rejected() {
    let toml = format!("{}{}", named_action_toml("dup"), named_action_toml("dup"));
    assert_invalid(&config_from_toml(&toml).unwrap(), "duplicate action name");
}

/// Tests the action name alphabet is enforced.
#[test]
fn action_names_are_restricted() {
    for name in ["Upper", "has space", "semi;colon", "..."] {
        let config = config_from_toml(&named_action_toml(name)).unwrap();
        assert!(config.validate().is_err(), "{name}");
    }
    let long = "a".repeat(129);
    assert_invalid(&config_from_toml(&named_action_toml(&long)).unwrap(), "too long");
    assert!(config_from_toml(&named_action_toml("ok.name_1-x")).unwrap().validate().is_ok());
}

/// Tests command executables must be allow-listed.
#[test]
fn command_executable_must_be_allow_listed() {
    let toml = r#"
[[actions]]
name = "echo"
classification = "read"
handler = { kind = "command", executable = "/bin/echo" }
"#;
    assert_invalid(&config_from_toml(toml).unwrap(), "allowed_executables");

    let allowed = format!("[execution]\nallowed_executables = [\"/bin/echo\"]\n{toml}");
    assert!(config_from_toml(&allowed).unwrap().validate().is_ok());
}

/// Tests relative executables are rejected.
#[test]
fn relative_executable_is_rejected() {
    let toml = r#"
[execution]
allowed_executables = ["/bin/echo"]

[[actions]]
name = "echo"
classification = "read"
handler = { kind = "command", executable = "echo" }
"#;
    assert_invalid(&config_from_toml(toml).unwrap(), "absolute path");
}

/// Tests elevation rule and permissions must be declared together.
#[test]
fn elevation_requires_both_halves() {
    let rule_only = format!(
        "{}elevate_when = {{ kind = \"field_present\", field = \"force\" }}\n",
        named_action_toml("a")
    );
    assert_invalid(&config_from_toml(&rule_only).unwrap(), "elevate_when requires");

    let permissions_only =
        format!("{}elevated_permissions = [\"x\"]\n", named_action_toml("a"));
    assert_invalid(&config_from_toml(&permissions_only).unwrap(), "requires elevate_when");
}

/// Tests schemas written as scalars are rejected.
#[test]
fn scalar_schema_is_rejected() {
    let toml = format!("{}input_schema = \"object\"\n", named_action_toml("a"));
    assert_invalid(&config_from_toml(&toml).unwrap(), "schemas must be tables");
}

/// Tests invalid schemas are caught when building the registry.
#[test]
fn invalid_schema_fails_registry_build() {
    let toml = format!("{}input_schema = {{ type = 5 }}\n", named_action_toml("a"));
    let config = config_from_toml(&toml).unwrap();
    config.validate().unwrap();
    assert!(matches!(config.build_registry(), Err(ConfigError::Invalid(_))));
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Tests timeout overrides must reference declared actions.
#[test]
fn timeout_override_must_reference_action() {
    let toml = format!(
        "[execution.timeout_overrides]\nghost = 5\n{}",
        named_action_toml("real")
    );
    assert_invalid(&config_from_toml(&toml).unwrap(), "unknown action: ghost");
}

/// Tests timeout bounds are enforced.
#[test]
fn timeouts_are_bounded() {
    assert_invalid(
        &config_from_toml("[execution]\ndefault_timeout_secs = 0\n").unwrap(),
        "default_timeout_secs",
    );
    let toml = format!("{}timeout_secs = 7200\n", named_action_toml("slow"));
    assert_invalid(&config_from_toml(&toml).unwrap(), "timeout_secs");
}

/// Tests overrides win over the action's own timeout and caps apply.
#[test]
fn overrides_and_caps_shape_definitions() {
    let toml = r#"
[execution]
allowed_executables = ["/bin/echo"]
max_output_bytes = 4096

[execution.timeout_overrides]
"echo" = 3

[[actions]]
name = "echo"
classification = "read"
timeout_secs = 20
handler = { kind = "command", executable = "/bin/echo", max_output_bytes = 65536 }

[[actions]]
name = "plain"
classification = "write"
timeout_secs = 9
handler = { kind = "named", name = "noop" }
"#;
    let config = config_from_toml(toml).unwrap();
    config.validate().unwrap();
    let definitions = config.definitions();

    assert_eq!(definitions[0].timeout, Some(Duration::from_secs(3)));
    let HandlerRef::Command(spec) = &definitions[0].handler else {
        panic!("expected command handler");
    };
    assert_eq!(spec.max_output_bytes, 4096);
    assert_eq!(definitions[1].timeout, Some(Duration::from_secs(9)));
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Tests signing keys must decode to 32 bytes.
#[test]
fn signing_keys_are_checked() {
    let good = format!("[[auth.signing_keys]]\nid = \"k1\"\npublic_key = \"{ZERO_KEY_B64}\"\n");
    assert!(config_from_toml(&good).unwrap().validate().is_ok());

    let short = "[[auth.signing_keys]]\nid = \"k1\"\npublic_key = \"AAAAAAAAAAAAAAAAAAAAAA==\"\n";
    assert_invalid(&config_from_toml(short).unwrap(), "32 bytes");

    let garbage = "[[auth.signing_keys]]\nid = \"k1\"\npublic_key = \"not base64!\"\n";
    assert_invalid(&config_from_toml(garbage).unwrap(), "base64");

    let duplicate = format!("{good}{good}");
    assert_invalid(&config_from_toml(&duplicate).unwrap(), "duplicate signing key");
}

/// Tests static identities must be unique and non-empty.
#[test]
fn static_identities_are_checked() {
    let entry = "[[auth.static_identities]]\nid = \"abc\"\nsubject = \"ops\"\npermissions = [\"a\"]\n";
    assert!(config_from_toml(entry).unwrap().validate().is_ok());
    assert_invalid(&config_from_toml(&format!("{entry}{entry}")).unwrap(), "duplicate");

    let empty = "[[auth.static_identities]]\nid = \"\"\nsubject = \"ops\"\n";
    assert_invalid(&config_from_toml(empty).unwrap(), "must be non-empty");
}

/// Tests clock skew and queue capacity limits.
#[test]
fn numeric_limits_are_enforced() {
    assert_invalid(
        &config_from_toml("[auth]\nmax_clock_skew_secs = 7200\n").unwrap(),
        "max_clock_skew_secs",
    );
    assert_invalid(
        &config_from_toml("[audit]\nqueue_capacity = 100000\n").unwrap(),
        "queue_capacity",
    );
    assert_invalid(
        &config_from_toml("[execution]\nmax_output_bytes = 0\n").unwrap(),
        "max_output_bytes",
    );
}
