//! Read-only claim model.
//!
//! A decoded payload becomes a `ClaimSet`: claim name -> `ClaimValue`.
//! Nothing here says whether the claims can be trusted; that is carried by the
//! wrapper types (`UnvalidatedClaims` in the parser, `ValidatedClaims` in the
//! validator).

use std::collections::BTreeMap;

use serde::Serialize;

/// A single claim value as it appeared in the JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClaimValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
    List(Vec<ClaimValue>),
    Map(BTreeMap<String, ClaimValue>),
}

impl ClaimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// NumericDate (RFC 7519 §2): seconds since epoch, fractional part dropped.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ClaimValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ClaimValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for ClaimValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(ClaimValue::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ClaimValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Claim name -> value. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: BTreeMap<String, ClaimValue>,
}

impl ClaimSet {
    pub(crate) fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            claims: object
                .into_iter()
                .map(|(k, v)| (k, ClaimValue::from(v)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    /// Look up a nested claim with a dot-separated path, e.g. `realm_access.roles`.
    ///
    /// A top-level claim whose name literally contains the whole path wins, so
    /// claim names with dots (`https://example.com/roles`) stay reachable.
    pub fn get_path(&self, path: &str) -> Option<&ClaimValue> {
        if let Some(value) = self.claims.get(path) {
            return Some(value);
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.claims.get(first)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get("iss").and_then(ClaimValue::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(ClaimValue::as_str)
    }

    pub fn expiry(&self) -> Option<i64> {
        self.get("exp").and_then(ClaimValue::as_timestamp)
    }

    pub fn not_before(&self) -> Option<i64> {
        self.get("nbf").and_then(ClaimValue::as_timestamp)
    }

    pub fn token_id(&self) -> Option<&str> {
        self.get("jti").and_then(ClaimValue::as_str)
    }

    /// `aud` may be a single string or a list of strings.
    pub fn audiences(&self) -> Vec<&str> {
        match self.get("aud") {
            Some(ClaimValue::String(s)) => vec![s.as_str()],
            Some(ClaimValue::List(items)) => items.iter().filter_map(ClaimValue::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Collect role/group identifiers from every configured claim path.
    ///
    /// Each path may hold a single string or a list; non-string entries are skipped.
    pub fn roles<'a>(&'a self, paths: &[String]) -> Vec<&'a str> {
        let mut out = Vec::new();
        for path in paths {
            match self.get_path(path) {
                Some(ClaimValue::String(s)) => out.push(s.as_str()),
                Some(ClaimValue::List(items)) => {
                    out.extend(items.iter().filter_map(ClaimValue::as_str))
                }
                _ => {}
            }
        }
        out
    }
}
