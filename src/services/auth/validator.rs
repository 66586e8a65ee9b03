//! Signature + claim validation.
//!
//! `validate` is the only place a `ValidatedClaims` can be built: its fields are
//! private to this module. Order of checks:
//! 1. header `alg` against the configured allow-list (rejects `none`)
//! 2. key resolution by `kid`
//! 3. signature (jsonwebtoken, with every claim check disabled)
//! 4. `iss` exact match, optional `aud`
//! 5. `[nbf, exp)` window widened by the clock skew

use std::str::FromStr;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Validation};
use serde::de::IgnoredAny;
use tracing::debug;

use super::keys::{KeyMaterial, KeyProvider};
use super::token::{ClaimSet, RawToken, TokenHeader, UnvalidatedClaims};

/// Caller-side knobs for token validation.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub expected_issuer: String,
    pub allowed_algorithms: Vec<Algorithm>,
    pub clock_skew_seconds: u64,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no verification key for kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("signature verification failed")]
    BadSignature,
    #[error("algorithm '{0}' is not allowed")]
    AlgorithmNotAllowed(String),
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
    #[error("claim {0} is not a numeric date")]
    InvalidClaim(&'static str),
}

/// Claims whose signature, issuer and validity window have been checked.
#[derive(Debug, Clone)]
pub struct ValidatedClaims {
    claims: ClaimSet,
    issuer: String,
    subject: String,
    expires_at: i64,
    not_before: Option<i64>,
    key_id: String,
}

impl ValidatedClaims {
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn not_before(&self) -> Option<i64> {
        self.not_before
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

pub fn validate(
    header: &TokenHeader,
    claims: UnvalidatedClaims,
    raw: &RawToken,
    keys: &dyn KeyProvider,
    policy: &ValidationPolicy,
    now: DateTime<Utc>,
) -> Result<ValidatedClaims, ValidationError> {
    let algorithm = Algorithm::from_str(&header.alg)
        .ok()
        .filter(|alg| policy.allowed_algorithms.contains(alg))
        .ok_or_else(|| ValidationError::AlgorithmNotAllowed(header.alg.clone()))?;

    let kid = header
        .kid
        .as_deref()
        .ok_or(ValidationError::UnknownKey(None))?;
    let key = keys
        .get_key(kid)
        .ok_or_else(|| ValidationError::UnknownKey(Some(kid.to_string())))?;

    verify_signature(raw, algorithm, &key)?;

    // Signature holds: the payload is what the issuer signed.
    let claims = claims.into_inner();

    let issuer = claims
        .issuer()
        .ok_or(ValidationError::MissingClaim("iss"))?
        .to_string();
    if issuer != policy.expected_issuer {
        return Err(ValidationError::IssuerMismatch);
    }

    if let Some(expected) = policy.audience.as_deref()
        && !claims.audiences().contains(&expected)
    {
        return Err(ValidationError::AudienceMismatch);
    }

    let subject = claims
        .subject()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ValidationError::MissingClaim("sub"))?
        .to_string();
    let expires_at = match claims.get("exp") {
        None => return Err(ValidationError::MissingClaim("exp")),
        Some(_) => claims
            .expiry()
            .ok_or(ValidationError::InvalidClaim("exp"))?,
    };
    // Absent nbf means no lower bound; an unreadable one is refused.
    let not_before = match claims.get("nbf") {
        None => None,
        Some(_) => Some(
            claims
                .not_before()
                .ok_or(ValidationError::InvalidClaim("nbf"))?,
        ),
    };

    let now = now.timestamp();
    let skew = i64::try_from(policy.clock_skew_seconds).unwrap_or(i64::MAX);
    if now >= expires_at.saturating_add(skew) {
        return Err(ValidationError::Expired);
    }
    if let Some(nbf) = not_before
        && now < nbf.saturating_sub(skew)
    {
        return Err(ValidationError::NotYetValid);
    }

    Ok(ValidatedClaims {
        issuer,
        subject,
        expires_at,
        not_before,
        key_id: kid.to_string(),
        claims,
    })
}

fn verify_signature(
    raw: &RawToken,
    algorithm: Algorithm,
    key: &KeyMaterial,
) -> Result<(), ValidationError> {
    // A key published for one algorithm must not verify another.
    if let Some(pinned) = key.algorithm()
        && pinned != algorithm
    {
        debug!(?pinned, ?algorithm, "token alg differs from key alg");
        return Err(ValidationError::BadSignature);
    }

    // Signature only: claims are checked by `validate` against `now`.
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<IgnoredAny>(raw.as_str(), key.decoding_key(), &validation)
        .map(|_| ())
        .map_err(|e| {
            debug!(error = %e, "signature verification failed");
            ValidationError::BadSignature
        })
}
