// crates/callgate-config/tests/config_loading.rs
// =============================================================================
// Module: Config Loading Tests
// Description: File loading, limits, defaults and the canonical example.
// =============================================================================
//! ## Overview
//! Validates that configuration loads from disk with defaults applied and
//! fails closed on oversized, non-UTF-8 or malformed input.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::fs;
use std::time::Duration;

use callgate_config::ConfigError;
use callgate_config::GatewayConfig;
use callgate_config::config_toml_example;
use callgate_core::HandlerRef;
use tempfile::TempDir;

mod common;

/// Writes content to a config file inside a temp dir.
fn write_config(dir: &TempDir, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join("callgate.toml");
    fs::write(&path, content).unwrap();
    path
}

/// Tests an empty file loads with every default applied.
#[test]
fn empty_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = GatewayConfig::load(Some(&write_config(&dir, b""))).unwrap();

    assert!(config.actions.is_empty());
    assert_eq!(config.audit.queue_capacity, 1024);
    assert!(!config.audit.debug_capture);
    assert_eq!(config.auth.max_clock_skew_secs, 60);
    assert_eq!(config.execution.default_timeout(), Duration::from_secs(30));
}

/// Tests the canonical example loads, validates and builds a registry.
#[test]
fn canonical_example_is_valid() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, config_toml_example().as_bytes());
    let config = GatewayConfig::load(Some(&path)).unwrap();
    let registry = config.build_registry().unwrap();

    assert_eq!(registry.len(), 2);
    let files = registry.get("files.list").unwrap();
    assert_eq!(files.timeout, Some(Duration::from_secs(10)));
    assert!(matches!(files.handler, HandlerRef::Command(_)));
    let tickets = registry.get("tickets.read").unwrap();
    assert!(tickets.elevation.is_some());
    assert!(tickets.sensitive_inputs.contains("ticket_id"));
    let patterns: Vec<&str> =
        tickets.output_policy.rules().iter().map(|rule| rule.pattern.as_str()).collect();
    assert_eq!(
        patterns,
        vec![".ticket.subject", ".ticket.requester.email", ".ticket.status", "..internal_notes"]
    );
}

/// Tests missing files surface as I/O errors.
#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = GatewayConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

/// Tests oversized files are rejected before parsing.
#[test]
fn oversized_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut content = b"# padding\n".repeat(110_000);
    content.extend_from_slice(b"[audit]\n");
    let err = GatewayConfig::load(Some(&write_config(&dir, &content))).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(message) if message.contains("size limit")));
}

/// Tests non-UTF-8 content is rejected.
#[test]
fn non_utf8_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = GatewayConfig::load(Some(&write_config(&dir, &[0xff, 0xfe, 0x00]))).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(message) if message.contains("utf-8")));
}

/// Tests malformed TOML and unknown keys are parse errors.
#[test]
fn malformed_toml_is_parse_error() {
    assert!(matches!(common::config_from_toml("[audit"), Err(ConfigError::Parse(_))));
    assert!(matches!(
        common::config_from_toml("[audit]\nunknown_key = 1\n"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        common::config_from_toml(
            "[[actions]]\nname = \"a\"\nclassification = \"read\"\nhandler = { kind = \"named\", name = \"n\" }\noutput_policy = { \".a[\" = \"allow\" }\n"
        ),
        Err(ConfigError::Parse(_))
    ));
}

/// Tests loading validates the parsed configuration.
#[test]
fn load_runs_validation() {
    let dir = TempDir::new().unwrap();
    let content = "[audit]\nqueue_capacity = 0\n";
    let err = GatewayConfig::load(Some(&write_config(&dir, content.as_bytes()))).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(message) if message.contains("queue_capacity")));
}
