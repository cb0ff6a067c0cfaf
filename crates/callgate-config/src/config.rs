// crates/callgate-config/src/config.rs
// ============================================================================
// Module: Call Gate Configuration
// Description: Configuration loading and validation for the gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: callgate-core, base64, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits. Missing
//! or invalid configuration fails closed; the gateway refuses to start rather
//! than run with a partially understood catalog.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use callgate_core::ActionDefinition;
use callgate_core::ActionRegistry;
use callgate_core::HandlerRef;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::actions::ActionConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "callgate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CALLGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of declared actions.
pub const MAX_ACTIONS: usize = 1024;
/// Maximum number of static identities.
pub const MAX_STATIC_IDENTITIES: usize = 256;
/// Maximum number of signing keys.
pub const MAX_SIGNING_KEYS: usize = 64;
/// Maximum length of identity, subject and key identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 256;
/// Maximum permissions attached to one identity.
pub const MAX_PERMISSIONS_PER_IDENTITY: usize = 256;
/// Maximum accepted clock skew for token timestamps.
pub const MAX_CLOCK_SKEW_SECS: u64 = 3600;
/// Maximum audit queue capacity.
pub const MAX_AUDIT_QUEUE_CAPACITY: usize = 65_536;
/// Maximum call timeout.
pub const MAX_TIMEOUT_SECS: u64 = 3600;
/// Maximum number of allow-listed executables.
pub const MAX_ALLOWED_EXECUTABLES: usize = 256;
/// Upper bound for captured process output.
pub const MAX_OUTPUT_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Length of a raw ed25519 public key.
const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

// ============================================================================
// SECTION: Gateway Config
// ============================================================================

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Audit output configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Credential verification material.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Execution limits and allow-list.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Declared action catalog.
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

impl GatewayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::from_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audit.validate()?;
        self.auth.validate()?;
        self.execution.validate()?;
        if self.actions.len() > MAX_ACTIONS {
            return Err(ConfigError::Invalid("too many actions".to_string()));
        }
        let mut names = BTreeSet::new();
        for action in &self.actions {
            action.validate()?;
            if !names.insert(action.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate action name: {}",
                    action.name
                )));
            }
            if let HandlerRef::Command(spec) = &action.handler
                && !self.execution.allows(&spec.executable)
            {
                return Err(ConfigError::Invalid(format!(
                    "action {} uses an executable outside execution.allowed_executables",
                    action.name
                )));
            }
        }
        for name in self.execution.timeout_overrides.keys() {
            if !names.contains(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "timeout override references unknown action: {name}"
                )));
            }
        }
        Ok(())
    }

    /// Builds core action definitions with execution limits applied.
    #[must_use]
    pub fn definitions(&self) -> Vec<ActionDefinition> {
        self.actions.iter().map(|action| action.to_definition(&self.execution)).collect()
    }

    /// Builds a registry from the catalog, compiling every schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when registration fails.
    pub fn build_registry(&self) -> Result<ActionRegistry, ConfigError> {
        let mut registry = ActionRegistry::new();
        for definition in self.definitions() {
            registry.register(definition).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        Ok(registry)
    }
}

// ============================================================================
// SECTION: Audit Config
// ============================================================================

/// Audit output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Directory receiving daily JSON-lines files.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Record arguments in clear (sensitive fields hashed).
    #[serde(default)]
    pub debug_capture: bool,
    /// Bounded queue capacity between callers and the writer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: None,
            debug_capture: false,
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_AUDIT_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "audit.queue_capacity must be between 1 and {MAX_AUDIT_QUEUE_CAPACITY}"
            )));
        }
        if let Some(dir) = &self.dir
            && dir.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("audit.dir must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Auth Config
// ============================================================================

/// Credential verification material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Statically configured identities keyed by opaque id.
    #[serde(default)]
    pub static_identities: Vec<StaticIdentityConfig>,
    /// Ed25519 keys accepted for signed tokens.
    #[serde(default)]
    pub signing_keys: Vec<SigningKeyConfig>,
    /// Accepted clock skew for token timestamps.
    #[serde(default = "default_clock_skew_secs")]
    pub max_clock_skew_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            static_identities: Vec::new(),
            signing_keys: Vec::new(),
            max_clock_skew_secs: default_clock_skew_secs(),
        }
    }
}

impl AuthConfig {
    /// Validates auth configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.static_identities.len() > MAX_STATIC_IDENTITIES {
            return Err(ConfigError::Invalid("too many static identities".to_string()));
        }
        if self.signing_keys.len() > MAX_SIGNING_KEYS {
            return Err(ConfigError::Invalid("too many signing keys".to_string()));
        }
        if self.max_clock_skew_secs > MAX_CLOCK_SKEW_SECS {
            return Err(ConfigError::Invalid(format!(
                "auth.max_clock_skew_secs must be at most {MAX_CLOCK_SKEW_SECS}"
            )));
        }
        let mut ids = BTreeSet::new();
        for identity in &self.static_identities {
            validate_identifier("static identity id", &identity.id)?;
            validate_identifier("static identity subject", &identity.subject)?;
            if identity.permissions.len() > MAX_PERMISSIONS_PER_IDENTITY {
                return Err(ConfigError::Invalid(format!(
                    "static identity {} has too many permissions",
                    identity.subject
                )));
            }
            for permission in &identity.permissions {
                validate_identifier("permission", permission)?;
            }
            if !ids.insert(identity.id.as_str()) {
                return Err(ConfigError::Invalid("duplicate static identity id".to_string()));
            }
        }
        let mut kids = BTreeSet::new();
        for key in &self.signing_keys {
            validate_identifier("signing key id", &key.id)?;
            key.decode().map_err(ConfigError::Invalid)?;
            if !kids.insert(key.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate signing key id: {}", key.id)));
            }
        }
        Ok(())
    }

    /// Returns the clock skew as a duration.
    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.max_clock_skew_secs)
    }
}

/// Statically configured identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticIdentityConfig {
    /// Opaque identity presented by the caller.
    pub id: String,
    /// Subject recorded for the caller.
    pub subject: String,
    /// Granted permissions.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Public key accepted for signed tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningKeyConfig {
    /// Key identifier referenced by the token `kid` claim.
    pub id: String,
    /// Base64-encoded raw ed25519 public key.
    pub public_key: String,
}

impl SigningKeyConfig {
    /// Decodes the raw public key bytes.
    ///
    /// # Errors
    ///
    /// Returns a message when the key is not 32 bytes of valid base64.
    pub fn decode(&self) -> Result<[u8; ED25519_PUBLIC_KEY_LENGTH], String> {
        let bytes = STANDARD
            .decode(self.public_key.trim())
            .map_err(|_| format!("signing key {} is not valid base64", self.id))?;
        <[u8; ED25519_PUBLIC_KEY_LENGTH]>::try_from(bytes.as_slice())
            .map_err(|_| format!("signing key {} must be 32 bytes", self.id))
    }
}

// ============================================================================
// SECTION: Execution Config
// ============================================================================

/// Execution limits and allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Absolute paths of executables command actions may run.
    #[serde(default)]
    pub allowed_executables: Vec<PathBuf>,
    /// Timeout applied when an action sets none.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Per-action timeout overrides keyed by action name.
    #[serde(default)]
    pub timeout_overrides: BTreeMap<String, u64>,
    /// Global cap on captured process output.
    #[serde(default)]
    pub max_output_bytes: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            allowed_executables: Vec::new(),
            default_timeout_secs: default_timeout_secs(),
            timeout_overrides: BTreeMap::new(),
            max_output_bytes: None,
        }
    }
}

impl ExecutionConfig {
    /// Validates execution configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_executables.len() > MAX_ALLOWED_EXECUTABLES {
            return Err(ConfigError::Invalid("too many allowed executables".to_string()));
        }
        for executable in &self.allowed_executables {
            if !executable.is_absolute() {
                return Err(ConfigError::Invalid(
                    "execution.allowed_executables entries must be absolute paths".to_string(),
                ));
            }
        }
        validate_timeout("execution.default_timeout_secs", self.default_timeout_secs)?;
        for secs in self.timeout_overrides.values() {
            validate_timeout("execution.timeout_overrides", *secs)?;
        }
        if let Some(max) = self.max_output_bytes
            && (max == 0 || max > MAX_OUTPUT_BYTES_LIMIT)
        {
            return Err(ConfigError::Invalid(format!(
                "execution.max_output_bytes must be between 1 and {MAX_OUTPUT_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Returns true when the executable is allow-listed.
    #[must_use]
    pub fn allows(&self, executable: &Path) -> bool {
        executable.is_absolute()
            && self.allowed_executables.iter().any(|allowed| allowed == executable)
    }

    /// Returns the default timeout as a duration.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from argument, environment or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a non-empty, bounded identifier.
pub(crate) fn validate_identifier(label: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{label} must be non-empty")));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ConfigError::Invalid(format!("{label} too long")));
    }
    Ok(())
}

/// Validates a timeout in seconds.
pub(crate) fn validate_timeout(label: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Invalid(format!(
            "{label} must be between 1 and {MAX_TIMEOUT_SECS} seconds"
        )));
    }
    Ok(())
}

/// Default audit queue capacity.
const fn default_queue_capacity() -> usize {
    1024
}

/// Default accepted clock skew.
const fn default_clock_skew_secs() -> u64 {
    60
}

/// Default call timeout.
const fn default_timeout_secs() -> u64 {
    30
}
