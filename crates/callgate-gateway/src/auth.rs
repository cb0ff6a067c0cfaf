// crates/callgate-gateway/src/auth.rs
// ============================================================================
// Module: Call Gate Credential Verification
// Description: Static identities and ed25519-signed caller tokens.
// Purpose: Turn a presented credential into a verified caller context.
// Dependencies: base64, callgate-config, callgate-core, ed25519-dalek, serde
// ============================================================================

//! ## Overview
//! A [`CredentialVerifier`] maps a [`Credential`] to a [`CallerContext`].
//! The default verifier accepts static identities by exact id and signed
//! tokens of the form `<base64url(claims)>.<base64url(signature)>`, where the
//! ed25519 signature covers the encoded claims segment.
//!
//! Security posture: credentials are untrusted input. Tokens are size-capped
//! before decoding, signatures are checked with `verify_strict`, and the
//! credential value never appears in logs or audit entries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use callgate_config::AuthConfig;
use callgate_core::CallerContext;
use ed25519_dalek::Signature;
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted token size in bytes.
pub const MAX_TOKEN_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Credential presented with a call.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static identity id.
    Static(String),
    /// Signed caller token.
    Token(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Credential::Static(<redacted>)"),
            Self::Token(_) => f.write_str("Credential::Token(<redacted>)"),
        }
    }
}

/// Claims carried by a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    /// Signing key id.
    pub kid: String,
    /// Caller subject.
    pub sub: String,
    /// Granted permissions.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Issued-at, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Credential verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The credential was rejected; the reason is audit-only.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Configured key material is unusable.
    #[error("invalid signing key {id}: {reason}")]
    InvalidKey {
        /// Key id.
        id: String,
        /// Failure reason.
        reason: String,
    },
}

impl AuthError {
    /// Builds an unauthenticated error.
    fn rejected(reason: impl Into<String>) -> Self {
        Self::Unauthenticated(reason.into())
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies caller credentials.
pub trait CredentialVerifier: Send + Sync {
    /// Verifies a credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when the credential is rejected.
    fn verify(&self, credential: &Credential) -> Result<CallerContext, AuthError>;
}

/// Verifier that rejects every credential.
pub struct DenyAllVerifier;

impl CredentialVerifier for DenyAllVerifier {
    fn verify(&self, _credential: &Credential) -> Result<CallerContext, AuthError> {
        Err(AuthError::rejected("no credential verifier configured"))
    }
}

/// Verifier backed by `[auth]` configuration.
///
/// # Invariants
/// - `keys` holds only keys that decoded to valid ed25519 points.
pub struct DefaultCredentialVerifier {
    /// Static identities by id.
    identities: BTreeMap<String, CallerContext>,
    /// Token signing keys by id.
    keys: BTreeMap<String, VerifyingKey>,
    /// Allowed clock skew for `iat`/`exp`.
    skew: Duration,
}

impl DefaultCredentialVerifier {
    /// Builds the verifier from auth configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] when a signing key is unusable.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let identities = config
            .static_identities
            .iter()
            .map(|identity| {
                let context =
                    CallerContext::new(identity.subject.clone(), identity.permissions.iter());
                (identity.id.clone(), context)
            })
            .collect();
        let mut keys = BTreeMap::new();
        for key in &config.signing_keys {
            let invalid = |reason: String| AuthError::InvalidKey {
                id: key.id.clone(),
                reason,
            };
            let bytes = key.decode().map_err(invalid)?;
            let verifying =
                VerifyingKey::from_bytes(&bytes).map_err(|err| invalid(err.to_string()))?;
            keys.insert(key.id.clone(), verifying);
        }
        Ok(Self {
            identities,
            keys,
            skew: config.clock_skew(),
        })
    }

    /// Verifies a credential against an explicit clock (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when the credential is rejected.
    pub fn verify_at(&self, credential: &Credential, now: i64) -> Result<CallerContext, AuthError> {
        match credential {
            Credential::Static(id) => self
                .identities
                .get(id)
                .cloned()
                .ok_or_else(|| AuthError::rejected("unknown static identity")),
            Credential::Token(token) => self.verify_token(token, now),
        }
    }

    /// Verifies a signed token.
    fn verify_token(&self, token: &str, now: i64) -> Result<CallerContext, AuthError> {
        if token.len() > MAX_TOKEN_BYTES {
            return Err(AuthError::rejected("token too large"));
        }
        let (claims_segment, signature_segment) =
            token.split_once('.').ok_or_else(|| AuthError::rejected("malformed token"))?;
        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_segment)
            .map_err(|_| AuthError::rejected("malformed token claims"))?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_segment)
            .map_err(|_| AuthError::rejected("malformed token signature"))?;
        let claims: TokenClaims = serde_json::from_slice(&claims_bytes)
            .map_err(|_| AuthError::rejected("malformed token claims"))?;
        let key =
            self.keys.get(&claims.kid).ok_or_else(|| AuthError::rejected("unknown signing key"))?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|_| AuthError::rejected("malformed token signature"))?;
        key.verify_strict(claims_segment.as_bytes(), &signature)
            .map_err(|_| AuthError::rejected("invalid token signature"))?;
        let skew = i64::try_from(self.skew.as_secs()).unwrap_or(i64::MAX);
        if let Some(exp) = claims.exp
            && now > exp.saturating_add(skew)
        {
            return Err(AuthError::rejected("token expired"));
        }
        if let Some(iat) = claims.iat
            && iat > now.saturating_add(skew)
        {
            return Err(AuthError::rejected("token issued in the future"));
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthError::rejected("token subject is empty"));
        }
        Ok(CallerContext::new(claims.sub, claims.permissions).with_validity(claims.iat, claims.exp))
    }
}

impl CredentialVerifier for DefaultCredentialVerifier {
    fn verify(&self, credential: &Credential) -> Result<CallerContext, AuthError> {
        self.verify_at(credential, OffsetDateTime::now_utc().unix_timestamp())
    }
}
