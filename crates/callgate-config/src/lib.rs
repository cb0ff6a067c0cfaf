// crates/callgate-config/src/lib.rs
// ============================================================================
// Module: Call Gate Config Library
// Description: Canonical gateway configuration model and validation.
// Purpose: Single source of truth for callgate.toml semantics.
// Dependencies: callgate-core, serde, toml
// ============================================================================

//! ## Overview
//! `callgate-config` defines the gateway configuration: audit output,
//! credential material, execution limits and the action catalog. Loading is
//! strict and fail-closed; a configuration that passes [`GatewayConfig::load`]
//! can be turned into a registry without further checks.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod actions;
pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use actions::ActionConfig;
pub use config::*;
pub use examples::config_toml_example;
