// crates/callgate-gateway/tests/credentials.rs
// ============================================================================
// Module: Credential Verification Tests
// Description: Static identities, signed tokens and unauthenticated calls.
// ============================================================================
//! ## Overview
//! Validates token parsing, signature and clock checks, and that failed
//! verification produces one anonymous denied audit entry.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::use_debug,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use callgate_config::AuthConfig;
use callgate_config::SigningKeyConfig;
use callgate_config::StaticIdentityConfig;
use callgate_core::ANONYMOUS_SUBJECT;
use callgate_core::ActionDefinition;
use callgate_core::Classification;
use callgate_core::Decision;
use callgate_core::ErrorCode;
use callgate_core::HandlerRef;
use callgate_core::InternalDetail;
use callgate_core::Stage;
use callgate_gateway::AuthError;
use callgate_gateway::Credential;
use callgate_gateway::CredentialVerifier;
use callgate_gateway::DefaultCredentialVerifier;
use callgate_gateway::MAX_TOKEN_BYTES;
use callgate_gateway::TokenClaims;
use serde_json::json;

use crate::common::StaticHandler;
use crate::common::builder;
use crate::common::public_key_b64;
use crate::common::sign_token;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed clock used by token tests.
const NOW: i64 = 1_700_000_000;

/// Auth config with one static identity and the test signing key.
fn auth_config() -> AuthConfig {
    AuthConfig {
        static_identities: vec![StaticIdentityConfig {
            id: "ops-bot-key".to_string(),
            subject: "ops-bot".to_string(),
            permissions: vec!["files.read".to_string()],
        }],
        signing_keys: vec![SigningKeyConfig {
            id: "k1".to_string(),
            public_key: public_key_b64(),
        }],
        max_clock_skew_secs: 60,
    }
}

/// Claims for `agent-7` valid around [`NOW`].
fn claims() -> TokenClaims {
    TokenClaims {
        kid: "k1".to_string(),
        sub: "agent-7".to_string(),
        permissions: vec!["tickets.read".to_string()],
        iat: Some(NOW - 10),
        exp: Some(NOW + 300),
    }
}

/// Verifies a credential at [`NOW`].
fn verify(credential: &Credential) -> Result<callgate_core::CallerContext, AuthError> {
    DefaultCredentialVerifier::from_config(&auth_config()).unwrap().verify_at(credential, NOW)
}

/// Asserts a credential is rejected with a reason containing `needle`.
fn assert_rejected(credential: &Credential, needle: &str) {
    match verify(credential) {
        Err(AuthError::Unauthenticated(reason)) => {
            assert!(reason.contains(needle), "reason {reason} lacks {needle}");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(caller) => panic!("credential for {} accepted", caller.subject),
    }
}

// ============================================================================
// SECTION: Static Identities
// ============================================================================

/// Tests a known static id resolves to its subject and permissions.
#[test]
fn static_identity_resolves() {
    let caller = verify(&Credential::Static("ops-bot-key".to_string())).unwrap();
    assert_eq!(caller.subject, "ops-bot");
    assert!(caller.has_permission("files.read"));
    assert!(caller.expires_at.is_none());
}

/// Tests unknown static ids are rejected.
#[test]
fn unknown_static_identity_rejected() {
    assert_rejected(&Credential::Static("ops-bot".to_string()), "unknown static identity");
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// Tests a correctly signed token yields its claims.
#[test]
fn signed_token_verifies() {
    let caller = verify(&Credential::Token(sign_token(&claims()))).unwrap();
    assert_eq!(caller.subject, "agent-7");
    assert!(caller.has_permission("tickets.read"));
    assert_eq!(caller.expires_at, Some(NOW + 300));
}

/// Tests altering the claims after signing breaks the signature.
#[test]
fn tampered_claims_rejected() {
    let token = sign_token(&claims());
    let (_, signature) = token.split_once('.').unwrap();
    let mut forged = claims();
    forged.permissions.push("admin".to_string());
    let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
    assert_rejected(&Credential::Token(format!("{encoded}.{signature}")), "invalid token signature");
}

/// Tests expiry and issued-at are enforced with skew.
#[test]
fn clock_checks_apply_skew() {
    let mut expired = claims();
    expired.exp = Some(NOW - 61);
    assert_rejected(&Credential::Token(sign_token(&expired)), "expired");

    let mut within_skew = claims();
    within_skew.exp = Some(NOW - 30);
    assert!(verify(&Credential::Token(sign_token(&within_skew))).is_ok());

    let mut future = claims();
    future.iat = Some(NOW + 120);
    assert_rejected(&Credential::Token(sign_token(&future)), "future");
}

/// Tests malformed, oversized and unknown-key tokens are rejected.
#[test]
fn malformed_tokens_rejected() {
    assert_rejected(&Credential::Token("no-separator".to_string()), "malformed token");
    assert_rejected(&Credential::Token("!!!.???".to_string()), "malformed token");
    assert_rejected(&Credential::Token("a".repeat(MAX_TOKEN_BYTES + 1)), "too large");

    let mut unknown = claims();
    unknown.kid = "k9".to_string();
    assert_rejected(&Credential::Token(sign_token(&unknown)), "unknown signing key");
}

/// Tests credential debug output never shows the secret.
#[test]
fn credential_debug_is_redacted() {
    let rendered = format!("{:?}", Credential::Static("s3cret".to_string()));
    assert!(!rendered.contains("s3cret"));
}

/// Tests unusable key material fails verifier construction.
#[test]
fn invalid_key_material_rejected() {
    let mut config = auth_config();
    config.signing_keys[0].public_key = "AAAA".to_string();
    assert!(matches!(
        DefaultCredentialVerifier::from_config(&config),
        Err(AuthError::InvalidKey { .. })
    ));
}

// ============================================================================
// SECTION: Invoke
// ============================================================================

/// Tests a rejected credential yields one anonymous denied entry.
#[tokio::test]
async fn unauthenticated_invoke_is_audited_anonymously() {
    let handler = StaticHandler::new(json!({}));
    let action = ActionDefinition::new("files.list", Classification::Read, HandlerRef::named("l"));
    let (builder, audit, _) = builder(vec![action]);
    let verifier = DefaultCredentialVerifier::from_config(&auth_config()).unwrap();
    let engine = builder.handler("l", handler.clone()).verifier(Arc::new(verifier)).build().unwrap();

    let result =
        engine.invoke(&Credential::Static("nobody".to_string()), "files.list", json!({})).await;
    engine.flush_audit().await.unwrap();

    let failure = result.failure().unwrap();
    assert_eq!(failure.code, ErrorCode::Unauthenticated);
    assert_eq!(failure.stage, Stage::Permission);
    assert_eq!(handler.calls(), 0);
    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].decision, Decision::Denied);
    assert_eq!(entries[0].caller.subject, ANONYMOUS_SUBJECT);
    assert_eq!(entries[0].action.classification, Some(Classification::Read));
    assert!(matches!(
        entries[0].denial.as_ref().unwrap().detail,
        Some(InternalDetail::Authentication { .. })
    ));
}

/// Tests a verified static identity flows into the call.
#[tokio::test]
async fn authenticated_invoke_runs_call() {
    let action = ActionDefinition::new("files.list", Classification::Read, HandlerRef::named("l"))
        .with_required(["files.read"]);
    let (builder, audit, _) = builder(vec![action]);
    let verifier = DefaultCredentialVerifier::from_config(&auth_config()).unwrap();
    let engine = builder
        .handler("l", StaticHandler::new(json!({})))
        .verifier(Arc::new(verifier))
        .build()
        .unwrap();

    let result =
        engine.invoke(&Credential::Static("ops-bot-key".to_string()), "files.list", json!({})).await;
    engine.flush_audit().await.unwrap();

    assert!(result.is_ok());
    assert_eq!(audit.entries()[0].caller.subject, "ops-bot");
}

/// Tests the default verifier rejects everything via the trait object.
#[test]
fn deny_all_verifier_rejects() {
    let verifier: &dyn CredentialVerifier = &callgate_gateway::DenyAllVerifier;
    assert!(verifier.verify(&Credential::Static("x".to_string())).is_err());
}
