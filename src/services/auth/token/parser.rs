//! Compact JWS parsing (RFC 7515 §7.1): `base64url(header).base64url(payload).base64url(sig)`.
//!
//! Nothing decoded here is trusted. The payload comes back wrapped in
//! `UnvalidatedClaims`, which only the validator can unwrap.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::claims::ClaimSet;

/// The credential exactly as it arrived in the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken(String);

impl RawToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 prefix used to correlate log lines without logging the token.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        URL_SAFE_NO_PAD.encode(&digest[..9])
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the credential itself
        f.debug_tuple("RawToken").field(&self.fingerprint()).finish()
    }
}

/// JOSE header fields this gate looks at.
///
/// `alg` stays a string: an unsupported or hostile value (`none`) must reach the
/// allow-list check in the validator instead of failing as a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
}

/// Claims decoded from the payload, not yet checked against signature, issuer or time.
#[derive(Debug, Clone, PartialEq)]
pub struct UnvalidatedClaims(ClaimSet);

impl UnvalidatedClaims {
    pub(in crate::services::auth) fn into_inner(self) -> ClaimSet {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),
}

pub fn parse(raw: &RawToken) -> Result<(TokenHeader, UnvalidatedClaims), ParseError> {
    let mut segments = raw.as_str().split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(ParseError::Malformed("expected three segments"));
    };

    if header_b64.is_empty() || payload_b64.is_empty() {
        return Err(ParseError::Malformed("empty segment"));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| ParseError::Malformed("header is not base64url"))?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| ParseError::Malformed("payload is not base64url"))?;
    URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| ParseError::Malformed("signature is not base64url"))?;

    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|_| ParseError::Malformed("header is not a JOSE header"))?;
    if header.alg.trim().is_empty() {
        return Err(ParseError::Malformed("empty alg"));
    }

    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|_| ParseError::Malformed("payload is not json"))?;
    let serde_json::Value::Object(object) = payload else {
        return Err(ParseError::Malformed("payload is not a claim object"));
    };

    Ok((header, UnvalidatedClaims(ClaimSet::from_json_object(object))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn b64(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    fn token(header: serde_json::Value, payload: serde_json::Value, sig: &str) -> RawToken {
        RawToken::new(format!("{}.{}.{}", b64(&header), b64(&payload), sig))
    }

    #[test]
    fn parses_header_and_claims() {
        let raw = token(
            json!({ "alg": "RS256", "kid": "k1", "typ": "JWT" }),
            json!({ "sub": "alice", "groups": ["user"] }),
            "c2ln",
        );

        let (header, claims) = parse(&raw).unwrap();
        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(header.typ.as_deref(), Some("JWT"));

        let claims = claims.into_inner();
        assert_eq!(claims.subject(), Some("alice"));
    }

    #[test]
    fn keeps_hostile_alg_for_the_validator() {
        let raw = token(json!({ "alg": "none" }), json!({ "sub": "mallory" }), "");
        let (header, _) = parse(&raw).unwrap();
        assert_eq!(header.alg, "none");
        assert_eq!(header.kid, None);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        for raw in ["", "abc", "a.b", "a.b.c.d", "a.b.c.d.e"] {
            assert_eq!(
                parse(&RawToken::new(raw)),
                Err(ParseError::Malformed("expected three segments")),
                "{raw}"
            );
        }
    }

    #[test]
    fn rejects_bad_encoding() {
        let header = b64(&json!({ "alg": "HS256" }));
        let payload = b64(&json!({ "sub": "alice" }));

        let cases = [
            format!("{header}.{payload}.***"),
            format!("{header}.@@.sig"),
            format!("%%.{payload}.sig"),
            format!(".{payload}.sig"),
        ];
        for raw in cases {
            assert!(parse(&RawToken::new(raw.clone())).is_err(), "{raw}");
        }
    }

    #[test]
    fn rejects_missing_alg_and_non_object_payload() {
        let no_alg = token(json!({ "kid": "k1" }), json!({ "sub": "alice" }), "");
        assert!(matches!(parse(&no_alg), Err(ParseError::Malformed(_))));

        let empty_alg = token(json!({ "alg": " " }), json!({ "sub": "alice" }), "");
        assert!(matches!(parse(&empty_alg), Err(ParseError::Malformed(_))));

        let list_payload = token(json!({ "alg": "HS256" }), json!(["sub", "alice"]), "");
        assert_eq!(
            parse(&list_payload),
            Err(ParseError::Malformed("payload is not a claim object"))
        );

        let text = format!(
            "{}.{}.",
            b64(&json!({ "alg": "HS256" })),
            URL_SAFE_NO_PAD.encode("not json")
        );
        assert!(parse(&RawToken::new(text)).is_err());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let raw = RawToken::new("secret.secret.secret");
        let printed = format!("{raw:?}");
        assert!(!printed.contains("secret"));
        assert_eq!(raw.fingerprint().len(), 12);
    }
}
