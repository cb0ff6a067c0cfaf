// crates/callgate-core/src/core/caller.rs
// ============================================================================
// Module: Call Gate Caller Context
// Description: Per-call caller identity and permission set.
// Purpose: Carry the verified identity of the caller through one call.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`CallerContext`] is constructed per call from a verified credential or a
//! statically configured identity and dropped once the call completes. It is
//! never persisted; audit entries copy a [`CallerSnapshot`] instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Caller Context
// ============================================================================

/// Subject label recorded when no caller could be authenticated.
pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// Verified caller identity for a single call.
///
/// # Invariants
/// - Permission strings are opaque and compared exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Subject identifier.
    pub subject: String,
    /// Granted permissions.
    pub permissions: BTreeSet<String>,
    /// Issued-at time (unix seconds) when the identity came from a token.
    pub issued_at: Option<i64>,
    /// Expiry time (unix seconds) when the identity came from a token.
    pub expires_at: Option<i64>,
}

impl CallerContext {
    /// Creates a caller context without token timestamps.
    #[must_use]
    pub fn new<I, S>(subject: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            issued_at: None,
            expires_at: None,
        }
    }

    /// Returns a copy with token timestamps set.
    #[must_use]
    pub fn with_validity(mut self, issued_at: Option<i64>, expires_at: Option<i64>) -> Self {
        self.issued_at = issued_at;
        self.expires_at = expires_at;
        self
    }

    /// Returns true when the caller holds the exact permission string.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Returns an audit snapshot of this caller.
    #[must_use]
    pub fn snapshot(&self) -> CallerSnapshot {
        CallerSnapshot {
            subject: self.subject.clone(),
            permissions: self.permissions.iter().cloned().collect(),
        }
    }
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Caller identity as recorded in an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerSnapshot {
    /// Subject identifier.
    pub subject: String,
    /// Permissions held at call time (sorted).
    pub permissions: Vec<String>,
}

impl CallerSnapshot {
    /// Snapshot for a caller that failed authentication.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            subject: ANONYMOUS_SUBJECT.to_string(),
            permissions: Vec::new(),
        }
    }
}
