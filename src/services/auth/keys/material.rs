use std::{fmt, str::FromStr};

use jsonwebtoken::{Algorithm, DecodingKey, jwk::Jwk};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported key: {0}")]
    Unsupported(String),
    #[error("invalid key material: {0}")]
    Invalid(String),
    #[error("jwks contains no usable signing keys")]
    EmptyKeySet,
    #[error("jwks fetch failed: {0}")]
    Fetch(String),
    #[error("oidc discovery failed: {0}")]
    Discovery(String),
}

/// A verification key resolved by key id.
///
/// - `algorithm` is the algorithm the publisher pinned to this key (JWK `alg`), if any.
/// - Key material is intentionally not printable via Debug.
pub struct KeyMaterial {
    decoding_key: DecodingKey,
    algorithm: Option<Algorithm>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    pub fn from_jwk(jwk: &Jwk, algorithm: Option<Algorithm>) -> Result<Self, KeyError> {
        let decoding_key =
            DecodingKey::from_jwk(jwk).map_err(|e| KeyError::Invalid(e.to_string()))?;
        Ok(Self {
            decoding_key,
            algorithm,
        })
    }

    /// Public key in PEM form. The algorithm decides how the PEM is read.
    pub fn from_pem(pem: &str, algorithm: Algorithm) -> Result<Self, KeyError> {
        let bytes = pem.as_bytes();
        let decoding_key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(KeyError::Unsupported(
                    "HMAC algorithms take a shared secret, not a PEM".to_string(),
                ));
            }
            Algorithm::EdDSA => DecodingKey::from_ed_pem(bytes),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
            // RS* / PS*
            _ => DecodingKey::from_rsa_pem(bytes),
        }
        .map_err(|e| KeyError::Invalid(e.to_string()))?;

        Ok(Self {
            decoding_key,
            algorithm: Some(algorithm),
        })
    }

    /// Shared HMAC secret (HS256/384/512).
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: None,
        }
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }
}

/// Turn a JWKS document (`{"keys": [...]}`) into `(kid, key)` pairs.
///
/// Skipped entries:
/// - `use` other than `sig` (Keycloak also publishes an `enc` key)
/// - no `kid`
/// - an `alg` this crate cannot verify with (e.g. `RSA-OAEP`)
/// - key parameters jsonwebtoken rejects
pub fn parse_jwks(document: &serde_json::Value) -> Result<Vec<(String, KeyMaterial)>, KeyError> {
    let entries = document
        .get("keys")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| KeyError::Invalid("jwks has no 'keys' array".to_string()))?;

    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(kid) = entry.get("kid").and_then(serde_json::Value::as_str) else {
            debug!("skipping jwk without kid");
            continue;
        };

        if let Some(key_use) = entry.get("use").and_then(serde_json::Value::as_str)
            && key_use != "sig"
        {
            debug!(kid = %kid, key_use = %key_use, "skipping non-signing jwk");
            continue;
        }

        let algorithm = match entry.get("alg").and_then(serde_json::Value::as_str) {
            Some(alg) => match Algorithm::from_str(alg) {
                Ok(alg) => Some(alg),
                Err(_) => {
                    debug!(kid = %kid, alg = %alg, "skipping jwk with unsupported alg");
                    continue;
                }
            },
            None => None,
        };

        let jwk: Jwk = match serde_json::from_value(entry.clone()) {
            Ok(jwk) => jwk,
            Err(e) => {
                debug!(kid = %kid, error = %e, "skipping unparsable jwk");
                continue;
            }
        };

        match KeyMaterial::from_jwk(&jwk, algorithm) {
            Ok(material) => keys.push((kid.to_string(), material)),
            Err(e) => debug!(kid = %kid, error = %e, "skipping unusable jwk"),
        }
    }

    if keys.is_empty() {
        return Err(KeyError::EmptyKeySet);
    }
    Ok(keys)
}
