// crates/callgate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for callgate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use callgate_config::ConfigError;
use callgate_config::GatewayConfig;

/// Base64 of 32 zero bytes; a well-formed ed25519 public key encoding.
pub const ZERO_KEY_B64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Parses a TOML string into a `GatewayConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<GatewayConfig, ConfigError> {
    GatewayConfig::from_toml(toml_str)
}

/// Minimal single-action catalog using a named handler.
pub fn named_action_toml(name: &str) -> String {
    format!(
        r#"
[[actions]]
name = "{name}"
classification = "read"
handler = {{ kind = "named", name = "noop" }}
"#
    )
}

/// Asserts that validation fails with a message containing `needle`.
pub fn assert_invalid(config: &GatewayConfig, needle: &str) {
    match config.validate() {
        Err(ConfigError::Invalid(message)) => {
            assert!(message.contains(needle), "expected {needle:?} in {message:?}");
        }
        other => panic!("expected invalid config containing {needle:?}, got {other:?}"),
    }
}
