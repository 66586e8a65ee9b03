/* Responsibility
 * - Drive one request through extract -> parse -> validate -> authorize.
 * - Stop at the first failure; nothing downstream runs once a stage denies.
 * - Log the internal reason with a token fingerprint, never the token.
 */

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};

use super::authz::{Authorizer, PolicyRequirement};
use super::identity::Identity;
use super::keys::KeyProvider;
use super::token::{RawToken, parse};
use super::validator::{ValidationError, ValidationPolicy, validate};
use super::verdict::{DenyReason, Verdict};

/// Last stage a request reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GateStage {
    Start,
    TokenExtracted,
    Parsed,
    Validated,
    Authorized,
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub verdict: Verdict,
    pub stage: GateStage,
}

pub struct RequestGate {
    keys: Arc<dyn KeyProvider>,
    validation: ValidationPolicy,
    role_claims: Vec<String>,
    authorizer: Authorizer,
}

impl RequestGate {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        validation: ValidationPolicy,
        role_claims: Vec<String>,
        authorizer: Authorizer,
    ) -> Self {
        Self {
            keys,
            validation,
            role_claims,
            authorizer,
        }
    }

    pub async fn handle(
        &self,
        headers: &HeaderMap,
        resource_path: &str,
        requirement: &PolicyRequirement,
    ) -> Verdict {
        self.evaluate(headers, resource_path, requirement, Utc::now())
            .await
            .verdict
    }

    pub async fn evaluate(
        &self,
        headers: &HeaderMap,
        resource_path: &str,
        requirement: &PolicyRequirement,
        now: DateTime<Utc>,
    ) -> GateOutcome {
        let raw = match extract_bearer(headers) {
            Ok(raw) => raw,
            Err(reason) => return self.deny(reason, GateStage::Start, None, resource_path),
        };

        let (header, claims) = match parse(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                return self.deny(err.into(), GateStage::TokenExtracted, Some(&raw), resource_path);
            }
        };

        let validated = match validate(
            &header,
            claims,
            &raw,
            self.keys.as_ref(),
            &self.validation,
            now,
        ) {
            Ok(validated) => validated,
            Err(err) => {
                if matches!(err, ValidationError::UnknownKey(_)) {
                    self.keys.request_refresh();
                }
                return self.deny(err.into(), GateStage::Parsed, Some(&raw), resource_path);
            }
        };

        let identity = Identity::from_validated(validated, &self.role_claims);

        match self
            .authorizer
            .evaluate(&identity, requirement, resource_path)
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    subject = %identity.subject(),
                    requirement = %requirement,
                    path = %resource_path,
                    "request authorized"
                );
                GateOutcome {
                    verdict: Verdict::Allowed(identity),
                    stage: GateStage::Authorized,
                }
            }
            Err(err) => {
                tracing::warn!(
                    subject = %identity.subject(),
                    requirement = %requirement,
                    reason = %err,
                    token = %raw.fingerprint(),
                    path = %resource_path,
                    "request denied"
                );
                GateOutcome {
                    verdict: Verdict::Denied(err.into()),
                    stage: GateStage::Authorized,
                }
            }
        }
    }

    fn deny(
        &self,
        reason: DenyReason,
        stage: GateStage,
        raw: Option<&RawToken>,
        resource_path: &str,
    ) -> GateOutcome {
        let token = raw.map(RawToken::fingerprint).unwrap_or_default();
        tracing::warn!(
            stage = ?stage,
            reason = %reason,
            token = %token,
            path = %resource_path,
            "request denied"
        );
        GateOutcome {
            verdict: Verdict::Denied(reason),
            stage,
        }
    }
}

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
pub fn extract_bearer(headers: &HeaderMap) -> Result<RawToken, DenyReason> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(DenyReason::MissingCredential)?;
    let value = value
        .to_str()
        .map_err(|_| DenyReason::MalformedCredential)?
        .trim();

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or(DenyReason::MalformedCredential)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer")
        || token.is_empty()
        || token.contains(char::is_whitespace)
    {
        return Err(DenyReason::MalformedCredential);
    }

    Ok(RawToken::new(token))
}
