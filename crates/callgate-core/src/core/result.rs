// crates/callgate-core/src/core/result.rs
// ============================================================================
// Module: Call Gate Call Results
// Description: Caller-facing outcome of one governed call.
// Purpose: Separate what the caller sees from what only the audit trail sees.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`CallResult`] is either a success carrying filtered output or a
//! [`CallFailure`] naming the code, message and pipeline stage that stopped
//! the call. Each failure may also carry an [`InternalDetail`] that is
//! skipped on serialization; the gateway copies it into the audit entry only.
//!
//! Wire shape:
//! `{"ok": true, "data": ...}` or
//! `{"ok": false, "error": {"code", "message", "stage", "details"?}}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;
use serde_json::Value;

use crate::core::audit::Decision;

// ============================================================================
// SECTION: Stages and Codes
// ============================================================================

/// Pipeline stage at which a call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Action lookup.
    Registry,
    /// Authentication and permission evaluation.
    Permission,
    /// Input schema validation.
    Validation,
    /// Handler execution.
    Execution,
    /// Output schema validation.
    Output,
}

impl Stage {
    /// Returns the stable label for the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registry => "REGISTRY",
            Self::Permission => "PERMISSION",
            Self::Validation => "VALIDATION",
            Self::Execution => "EXECUTION",
            Self::Output => "OUTPUT",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No action registered under the requested name.
    NotFound,
    /// Credential could not be verified.
    Unauthenticated,
    /// Caller lacks a required permission.
    Forbidden,
    /// Arguments failed input schema validation.
    InvalidInput,
    /// Handler failed or timed out.
    ExecutionFailure,
    /// Handler output failed output schema validation.
    InvalidOutput,
}

impl ErrorCode {
    /// Returns the stable label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Unauthenticated => "Unauthenticated",
            Self::Forbidden => "Forbidden",
            Self::InvalidInput => "InvalidInput",
            Self::ExecutionFailure => "ExecutionFailure",
            Self::InvalidOutput => "InvalidOutput",
        }
    }

    /// Audit decision recorded for a call that failed with this code.
    ///
    /// Rejections of the request are `DENIED`; faults after the request was
    /// accepted are `ERROR`.
    #[must_use]
    pub const fn decision(self) -> Decision {
        match self {
            Self::NotFound | Self::Unauthenticated | Self::Forbidden | Self::InvalidInput => {
                Decision::Denied
            }
            Self::ExecutionFailure | Self::InvalidOutput => Decision::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Internal Detail
// ============================================================================

/// Location of a schema violation without the validator's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLocation {
    /// JSON pointer of the offending value.
    pub path: String,
    /// JSON type of the offending value.
    pub received: String,
}

/// Failure detail recorded in the audit trail and never returned to callers.
///
/// # Invariants
/// - Carries names, paths, types and exit status only; never raw values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InternalDetail {
    /// Permission check failed.
    MissingPermissions {
        /// Required permissions the caller lacked (sorted).
        missing: Vec<String>,
        /// Elevation outcome label.
        elevation: String,
    },
    /// Credential verification failed.
    Authentication {
        /// Verification failure reason.
        reason: String,
    },
    /// Input schema violations (locations only).
    InputViolations {
        /// Violation locations.
        fields: Vec<FieldLocation>,
    },
    /// Output schema violations (locations only).
    OutputViolations {
        /// Violation locations.
        fields: Vec<FieldLocation>,
    },
    /// Handler failure.
    Execution {
        /// Failure reason.
        reason: String,
        /// Process exit code when one was observed.
        exit_code: Option<i32>,
        /// Whether the process was terminated by a signal.
        signal: bool,
        /// Whether the call deadline elapsed.
        timed_out: bool,
    },
}

// ============================================================================
// SECTION: Call Failure
// ============================================================================

/// Caller-visible failure plus its audit-only detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFailure {
    /// Failure code.
    pub code: ErrorCode,
    /// Caller-safe message.
    pub message: String,
    /// Stage that stopped the call.
    pub stage: Stage,
    /// Caller-safe structured detail (input validation only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Audit-only detail.
    #[serde(skip)]
    pub internal: Option<InternalDetail>,
}

impl CallFailure {
    /// Unknown action name.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            code: ErrorCode::NotFound,
            message: "action not found".to_string(),
            stage: Stage::Registry,
            details: None,
            internal: None,
        }
    }

    /// Credential verification failed.
    #[must_use]
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Unauthenticated,
            message: "authentication failed".to_string(),
            stage: Stage::Permission,
            details: None,
            internal: Some(InternalDetail::Authentication {
                reason: reason.into(),
            }),
        }
    }

    /// Caller lacks required permissions.
    #[must_use]
    pub fn forbidden(missing: Vec<String>, elevation: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Forbidden,
            message: "not permitted".to_string(),
            stage: Stage::Permission,
            details: None,
            internal: Some(InternalDetail::MissingPermissions {
                missing,
                elevation: elevation.into(),
            }),
        }
    }

    /// Arguments failed input validation; `details` is returned verbatim.
    #[must_use]
    pub fn invalid_input(details: Value, fields: Vec<FieldLocation>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: "arguments failed schema validation".to_string(),
            stage: Stage::Validation,
            details: Some(details),
            internal: Some(InternalDetail::InputViolations {
                fields,
            }),
        }
    }

    /// Handler failed or timed out.
    #[must_use]
    pub fn execution(detail: InternalDetail) -> Self {
        Self {
            code: ErrorCode::ExecutionFailure,
            message: "action execution failed".to_string(),
            stage: Stage::Execution,
            details: None,
            internal: Some(detail),
        }
    }

    /// Handler output failed output validation.
    #[must_use]
    pub fn invalid_output(fields: Vec<FieldLocation>) -> Self {
        Self {
            code: ErrorCode::InvalidOutput,
            message: "internal error".to_string(),
            stage: Stage::Output,
            details: None,
            internal: Some(InternalDetail::OutputViolations {
                fields,
            }),
        }
    }
}

// ============================================================================
// SECTION: Call Result
// ============================================================================

/// Outcome of one governed call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// Call succeeded; `data` is the filtered output.
    Success {
        /// Filtered output value.
        data: Value,
    },
    /// Call stopped at some stage.
    Failure(CallFailure),
}

impl CallResult {
    /// Returns true for a success.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the output value of a success.
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Success {
                data,
            } => Some(data),
            Self::Failure(_) => None,
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&CallFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Renders the caller-facing JSON shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<CallFailure> for CallResult {
    fn from(failure: CallFailure) -> Self {
        Self::Failure(failure)
    }
}

impl Serialize for CallResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Self::Success {
                data,
            } => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("data", data)?;
            }
            Self::Failure(failure) => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", failure)?;
            }
        }
        map.end()
    }
}
