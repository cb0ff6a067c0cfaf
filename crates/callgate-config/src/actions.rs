// crates/callgate-config/src/actions.rs
// ============================================================================
// Module: Call Gate Action Catalog Config
// Description: `[[actions]]` entries and their conversion to definitions.
// Purpose: Describe governed actions declaratively and validate them early.
// Dependencies: callgate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Each `[[actions]]` table declares one governed action. Schemas are written
//! as TOML tables and converted to JSON Schema documents; the output policy
//! is an ordered table whose declaration order breaks specificity ties.
//!
//! ```toml
//! [[actions]]
//! name = "logs.tail"
//! classification = "read"
//! required_permissions = ["logs.read"]
//! output_policy = { "*" = "allow", "..token" = "redact" }
//!
//! [actions.handler]
//! kind = "command"
//! executable = "/usr/bin/tail"
//! args = [{ kind = "literal", value = "-n" }, { kind = "field", name = "lines" }]
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use callgate_core::ActionDefinition;
use callgate_core::Classification;
use callgate_core::ElevationRule;
use callgate_core::HandlerRef;
use callgate_core::OutputPolicy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::config::ConfigError;
use crate::config::ExecutionConfig;
use crate::config::validate_identifier;
use crate::config::validate_timeout;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum action name length.
pub const MAX_ACTION_NAME_LENGTH: usize = 128;
/// Maximum output policy rules per action.
pub const MAX_POLICY_RULES: usize = 256;
/// Maximum permissions named by one action.
pub const MAX_ACTION_PERMISSIONS: usize = 64;
/// Maximum sensitive input fields per action.
pub const MAX_SENSITIVE_INPUTS: usize = 64;
/// Maximum argument templates per command.
pub const MAX_COMMAND_ARGS: usize = 128;
/// Maximum description length.
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Action Config
// ============================================================================

/// One `[[actions]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    /// Unique action name (`[a-z0-9_.-]`).
    pub name: String,
    /// Description presented during capability discovery.
    #[serde(default)]
    pub description: String,
    /// Impact classification.
    pub classification: Classification,
    /// Input JSON Schema; defaults to any object.
    #[serde(default)]
    pub input_schema: Option<Value>,
    /// Output JSON Schema; defaults to any value.
    #[serde(default)]
    pub output_schema: Option<Value>,
    /// Base permissions required for every call.
    #[serde(default)]
    pub required_permissions: Vec<String>,
    /// Permissions added when `elevate_when` holds.
    #[serde(default)]
    pub elevated_permissions: Vec<String>,
    /// Elevation rule over raw call input.
    #[serde(default)]
    pub elevate_when: Option<ElevationRule>,
    /// Ordered field-path policy.
    #[serde(default)]
    pub output_policy: OutputPolicy,
    /// Top-level input fields hashed in debug capture.
    #[serde(default)]
    pub sensitive_inputs: Vec<String>,
    /// Per-action timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Execution strategy.
    pub handler: HandlerRef,
}

impl ActionConfig {
    /// Validates one action entry in isolation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the entry is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_action_name(&self.name)?;
        if self.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(self.invalid("description too long"));
        }
        if self.required_permissions.len() + self.elevated_permissions.len()
            > MAX_ACTION_PERMISSIONS
        {
            return Err(self.invalid("too many permissions"));
        }
        for permission in self.required_permissions.iter().chain(&self.elevated_permissions) {
            validate_identifier("permission", permission)?;
        }
        match (&self.elevate_when, self.elevated_permissions.is_empty()) {
            (Some(_), true) => {
                return Err(self.invalid("elevate_when requires elevated_permissions"));
            }
            (None, false) => {
                return Err(self.invalid("elevated_permissions requires elevate_when"));
            }
            _ => {}
        }
        if self.output_policy.len() > MAX_POLICY_RULES {
            return Err(self.invalid("too many output_policy rules"));
        }
        if self.sensitive_inputs.len() > MAX_SENSITIVE_INPUTS {
            return Err(self.invalid("too many sensitive_inputs"));
        }
        for field in &self.sensitive_inputs {
            validate_identifier("sensitive input", field)?;
        }
        for schema in [&self.input_schema, &self.output_schema].into_iter().flatten() {
            if !schema.is_object() && !schema.is_boolean() {
                return Err(self.invalid("schemas must be tables"));
            }
        }
        if let Some(secs) = self.timeout_secs {
            validate_timeout("timeout_secs", secs)?;
        }
        match &self.handler {
            HandlerRef::Command(spec) => {
                if !spec.executable.is_absolute() {
                    return Err(self.invalid("command executable must be an absolute path"));
                }
                if spec.args.len() > MAX_COMMAND_ARGS {
                    return Err(self.invalid("too many command args"));
                }
                if spec.max_output_bytes == 0 {
                    return Err(self.invalid("max_output_bytes must be greater than zero"));
                }
                if let Some(dir) = &spec.working_dir
                    && !dir.is_absolute()
                {
                    return Err(self.invalid("working_dir must be an absolute path"));
                }
            }
            HandlerRef::Named {
                name,
            } => validate_identifier("handler name", name)?,
        }
        Ok(())
    }

    /// Builds the core definition, applying execution overrides and caps.
    #[must_use]
    pub fn to_definition(&self, execution: &ExecutionConfig) -> ActionDefinition {
        let mut handler = self.handler.clone();
        if let (HandlerRef::Command(spec), Some(cap)) = (&mut handler, execution.max_output_bytes) {
            spec.max_output_bytes = spec.max_output_bytes.min(cap);
        }
        let mut definition =
            ActionDefinition::new(self.name.as_str(), self.classification, handler)
                .with_description(self.description.clone())
                .with_schemas(
                    self.input_schema.clone().unwrap_or_else(|| json!({"type": "object"})),
                    self.output_schema.clone().unwrap_or_else(|| json!({})),
                )
                .with_required(self.required_permissions.iter().cloned())
                .with_output_policy(self.output_policy.clone())
                .with_sensitive_inputs(self.sensitive_inputs.iter().cloned());
        if let Some(rule) = &self.elevate_when {
            definition = definition.with_elevation(rule.clone(), self.elevated_permissions.clone());
        }
        let timeout = execution.timeout_overrides.get(&self.name).copied().or(self.timeout_secs);
        if let Some(secs) = timeout {
            definition = definition.with_timeout(Duration::from_secs(secs));
        }
        definition
    }

    /// Builds an invalid-config error naming this action.
    fn invalid(&self, message: &str) -> ConfigError {
        ConfigError::Invalid(format!("action {}: {message}", self.name))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates an action name against the allowed alphabet and length.
fn validate_action_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Invalid("action name must be non-empty".to_string()));
    }
    if name.len() > MAX_ACTION_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("action name too long: {name}")));
    }
    let allowed = |ch: char| ch.is_ascii_lowercase() || ch.is_ascii_digit() || "_.-".contains(ch);
    if !name.chars().all(allowed) {
        return Err(ConfigError::Invalid(format!(
            "action name must use [a-z0-9_.-]: {name}"
        )));
    }
    if !name.chars().any(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ConfigError::Invalid(format!(
            "action name must contain a letter or digit: {name}"
        )));
    }
    Ok(())
}
