// crates/callgate-core/src/core/command.rs
// ============================================================================
// Module: Call Gate Command Specifications
// Description: Definition-time description of a bounded local execution.
// Purpose: Fix executable identity and argv shape before any caller input.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`CommandSpec`] is pure data: the executable path, an ordered list of
//! [`ArgTemplate`]s, working directory, environment overrides and output
//! handling. Nothing in it can be supplied by the caller; the caller only
//! contributes validated field values that templates splice in as whole argv
//! entries. Execution lives in the gateway crate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default cap on captured process output in bytes.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Command Spec
// ============================================================================

/// Fixed-command execution description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Absolute path of the executable.
    pub executable: PathBuf,
    /// Argument templates rendered in order.
    #[serde(default)]
    pub args: Vec<ArgTemplate>,
    /// Fixed working directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Environment overrides applied to the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Inherit the gateway's environment (default: start from an empty one).
    #[serde(default)]
    pub inherit_env: bool,
    /// Which output streams to capture.
    #[serde(default)]
    pub capture: CaptureStreams,
    /// How captured text becomes the action output value.
    #[serde(default)]
    pub output: OutputFormat,
    /// Maximum captured bytes across both streams.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl CommandSpec {
    /// Creates a spec for an executable with default capture and parsing.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            inherit_env: false,
            capture: CaptureStreams::default(),
            output: OutputFormat::default(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Returns a copy with the argument templates replaced.
    #[must_use]
    pub fn with_args(mut self, args: Vec<ArgTemplate>) -> Self {
        self.args = args;
        self
    }

    /// Returns a copy with the output format replaced.
    #[must_use]
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }
}

/// One argv entry (or group of entries) derived from validated input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgTemplate {
    /// Fixed argument.
    Literal {
        /// Argument text.
        value: String,
    },
    /// Value of an input field; arrays of scalars expand to one arg each.
    Field {
        /// Top-level input field name.
        name: String,
        /// Skip silently when the field is absent or null.
        #[serde(default)]
        optional: bool,
    },
    /// Emit `flag` when the boolean field is `true`.
    Flag {
        /// Top-level input field name.
        name: String,
        /// Flag text, e.g. `--force`.
        flag: String,
    },
    /// Emit `flag` followed by the field value when the field is present.
    #[serde(rename = "option")]
    Param {
        /// Top-level input field name.
        name: String,
        /// Flag text, e.g. `--depth`.
        flag: String,
    },
}

/// Output streams captured from the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStreams {
    /// Standard output only.
    #[default]
    Stdout,
    /// Standard output followed by standard error, parsed as one text.
    Combined,
    /// Both streams; output becomes `{"stdout": <parsed>, "stderr": <text>}`.
    Separate,
}

/// Parser applied to captured, control-sequence-stripped text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputFormat {
    /// The text itself, as a JSON string.
    #[default]
    Text,
    /// A single JSON document.
    Json,
    /// Newline-delimited JSON, collected into an array.
    JsonLines,
    /// A transform registered by name on the command handler.
    Custom {
        /// Transform name.
        transform: String,
    },
}

/// Default maximum captured output.
const fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}
