use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};

use super::token::ClaimSet;
use super::validator::ValidatedClaims;

/// Who the caller is, derived from a validated token.
///
/// Only buildable from `ValidatedClaims`, so an `Identity` always stands on a
/// verified signature and a checked validity window. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Identity {
    subject: String,
    issuer: String,
    roles: BTreeSet<String>,
    expires_at: i64,
    token_id: Option<String>,
    claims: Arc<ClaimSet>,
}

impl Identity {
    pub fn from_validated(validated: ValidatedClaims, role_claims: &[String]) -> Self {
        let claims = validated.claims();
        Self {
            subject: validated.subject().to_string(),
            issuer: validated.issuer().to_string(),
            roles: claims
                .roles(role_claims)
                .into_iter()
                .map(str::to_string)
                .collect(),
            expires_at: validated.expires_at(),
            token_id: claims.token_id().map(str::to_string),
            claims: Arc::new(claims.clone()),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Exact, case-sensitive membership. No role implies another.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    pub fn token_id(&self) -> Option<&str> {
        self.token_id.as_deref()
    }

    /// Every claim of the token, read-only.
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }
}

#[cfg(test)]
impl Identity {
    pub(crate) fn for_tests(subject: &str, roles: &[&str]) -> Self {
        Self {
            subject: subject.to_string(),
            issuer: super::test_support::ISSUER.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            expires_at: super::test_support::NOW + 300,
            token_id: None,
            claims: Arc::new(ClaimSet::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::test_support::{KID, NOW, at, policy, sign_hs256, test_keys, user_claims};
    use crate::services::auth::token::{RawToken, parse};
    use crate::services::auth::validator::validate;
    use serde_json::json;

    #[test]
    fn collects_roles_from_configured_claims() {
        let mut claims = user_claims(&["user"]);
        claims["realm_access"] = json!({ "roles": ["offline_access", "user"] });
        let raw = RawToken::new(sign_hs256(KID, &claims));
        let (header, unvalidated) = parse(&raw).unwrap();
        let validated = validate(&header, unvalidated, &raw, &test_keys(), &policy(), at(NOW)).unwrap();

        let paths = vec!["groups".to_string(), "realm_access.roles".to_string()];
        let identity = Identity::from_validated(validated, &paths);

        assert_eq!(identity.subject(), "alice");
        assert_eq!(
            identity.roles().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["offline_access", "user"]
        );
        assert_eq!(identity.token_id(), Some("jti-1"));
        assert_eq!(identity.expires_at().map(|t| t.timestamp()), Some(NOW + 300));
        assert_eq!(
            identity.claims().get("preferred_username").and_then(|v| v.as_str()),
            Some("alice")
        );
    }

    #[test]
    fn role_membership_is_exact() {
        let identity = Identity::for_tests("alice", &["user", "Reports-Reader"]);
        assert!(identity.has_role("user"));
        assert!(!identity.has_role("User"));
        assert!(!identity.has_role("use"));
        assert!(!identity.has_role("reports-reader"));
        assert!(!identity.has_role(""));
    }
}
