// crates/callgate-core/src/core/audit.rs
// ============================================================================
// Module: Call Gate Audit Records
// Description: Append-only record of one call attempt.
// Purpose: Define the audit entry shape shared by the engine and writers.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Exactly one [`AuditEntry`] is produced per call attempt, on every path.
//! Entries carry hashes, field paths, permission names, exit codes and schema
//! locations. Raw argument and output values never appear, with the single
//! exception of the opt-in debug request capture (sensitive fields hashed).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::action::Classification;
use crate::core::caller::CallerSnapshot;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::ActionName;
use crate::core::identifiers::TraceId;
use crate::core::result::ErrorCode;
use crate::core::result::InternalDetail;
use crate::core::result::Stage;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Final disposition of a call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Call executed and its filtered output returned.
    Allowed,
    /// Request rejected before execution.
    Denied,
    /// Execution or output validation failed.
    Error,
}

/// Action identity as recorded in an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    /// Requested action name.
    pub name: ActionName,
    /// Classification when the action was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

/// Why a call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    /// Failure code returned to the caller.
    pub code: ErrorCode,
    /// Message returned to the caller.
    pub reason: String,
    /// Stage that stopped the call.
    pub stage: Stage,
    /// Audit-only detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<InternalDetail>,
}

/// Metadata about a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Masked or redacted paths, rendered `.a.b[2].c`.
    pub touched_paths: Vec<String>,
    /// Hash of the filtered output as returned to the caller.
    pub output_hash: HashDigest,
}

/// One audit record.
///
/// # Invariants
/// - Created once per call attempt and never mutated after dispatch.
/// - `denial` is present iff `decision` is not [`Decision::Allowed`].
/// - `response` is present iff `decision` is [`Decision::Allowed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// RFC 3339 UTC timestamp of call start.
    pub timestamp: String,
    /// Per-call trace identifier.
    pub trace_id: TraceId,
    /// Caller identity.
    pub caller: CallerSnapshot,
    /// Requested action.
    pub action: ActionSnapshot,
    /// Hash of the canonicalized arguments.
    pub request_fingerprint: HashDigest,
    /// Debug-mode argument capture with sensitive fields hashed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_capture: Option<Value>,
    /// Final disposition.
    pub decision: Decision,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<Denial>,
    /// Success metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseMeta>,
    /// Wall-clock call duration in microseconds.
    pub duration_us: u64,
}

impl AuditEntry {
    /// Returns the UTC calendar day (`YYYY-MM-DD`) of the entry.
    #[must_use]
    pub fn utc_day(&self) -> &str {
        self.timestamp.get(..10).unwrap_or(self.timestamp.as_str())
    }
}
