// crates/callgate-core/src/core/hashing.rs
// ============================================================================
// Module: Call Gate Fingerprints
// Description: Canonical JSON fingerprints for arguments and outputs.
// Purpose: Identify call payloads in the audit trail without storing them.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Call Gate never writes raw arguments or outputs to the audit trail. It
//! records the SHA-256 digest of their RFC 8785 (JCS) canonical form, so two
//! calls with the same arguments share a fingerprint regardless of key order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Digest algorithm recorded alongside every fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

/// Fingerprint of a JSON payload; displays as `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest.
    pub value: String,
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.algorithm {
            HashAlgorithm::Sha256 => write!(f, "sha256:{}", self.value),
        }
    }
}

// ============================================================================
// SECTION: Fingerprinting
// ============================================================================

/// Fingerprints a JSON value over its canonical encoding.
///
/// Values that cannot be canonicalized are hashed over their compact encoding.
#[must_use]
pub fn fingerprint_json(value: &Value) -> HashDigest {
    let bytes = serde_jcs::to_vec(value).unwrap_or_else(|_| value.to_string().into_bytes());
    HashDigest {
        algorithm: HashAlgorithm::Sha256,
        value: format!("{:x}", Sha256::digest(&bytes)),
    }
}
