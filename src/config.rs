/*
 * Responsibility
 * - Read settings from the environment (issuer, key source, policy service, bindings)
 * - Validate them up front; anything missing or malformed fails startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::services::auth::authz::PolicyBindings;
use crate::services::auth::validator::ValidationPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where verification keys come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// One PEM public key, registered under `kid`.
    Static {
        kid: String,
        pem: String,
        algorithm: Algorithm,
    },
    /// A JWKS document, refreshed periodically. `None` means OIDC discovery from the issuer.
    Jwks {
        uri: Option<Url>,
        refresh_interval: Duration,
    },
}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub auth_issuer: String,
    pub auth_audience: Option<String>,
    pub allowed_algorithms: Vec<Algorithm>,
    pub clock_skew_seconds: u64,
    pub role_claims: Vec<String>,
    pub key_source: KeySource,
    pub key_rotation_overlap: Duration,

    pub policy_service_url: Option<Url>,
    pub policy_service_timeout: Duration,
    pub policy_alert_threshold: u64,
    pub policy_bindings: PolicyBindings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same rules as `from_env`, reading through `var` instead of the process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port: u16 = match var("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV").as_deref());

        let auth_issuer = var("AUTH_ISSUER").ok_or(ConfigError::Missing("AUTH_ISSUER"))?;
        Url::parse(&auth_issuer).map_err(|_| ConfigError::Invalid("AUTH_ISSUER"))?;

        let auth_audience = var("AUTH_AUDIENCE");

        let allowed_algorithms = parse_algorithms(
            var("AUTH_ALLOWED_ALGORITHMS").as_deref().unwrap_or("RS256"),
        )?;

        let clock_skew_seconds = parse_number(&var, "AUTH_CLOCK_SKEW_SECONDS", 60)?;

        let role_claims = var("AUTH_ROLE_CLAIMS")
            .unwrap_or_else(|| "roles,groups,realm_access.roles".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let key_source = match var("AUTH_PUBLIC_KEY_PEM") {
            Some(pem) => {
                let algorithm = match var("AUTH_PUBLIC_KEY_ALG") {
                    Some(alg) => Algorithm::from_str(&alg)
                        .map_err(|_| ConfigError::Invalid("AUTH_PUBLIC_KEY_ALG"))?,
                    None => allowed_algorithms[0],
                };
                if !allowed_algorithms.contains(&algorithm) {
                    return Err(ConfigError::Invalid("AUTH_PUBLIC_KEY_ALG"));
                }
                KeySource::Static {
                    kid: var("AUTH_PUBLIC_KEY_ID").unwrap_or_else(|| "static".to_string()),
                    pem: pem.replace("\\n", "\n"),
                    algorithm,
                }
            }
            None => KeySource::Jwks {
                uri: var("AUTH_JWKS_URI")
                    .map(|u| Url::parse(&u).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URI")))
                    .transpose()?,
                refresh_interval: Duration::from_secs(
                    parse_number(&var, "AUTH_JWKS_REFRESH_SECONDS", 300)?.max(1),
                ),
            },
        };

        let key_rotation_overlap =
            Duration::from_secs(parse_number(&var, "AUTH_KEY_ROTATION_OVERLAP_SECONDS", 600)?);

        let policy_service_url = var("POLICY_SERVICE_URL")
            .map(|u| Url::parse(&u).map_err(|_| ConfigError::Invalid("POLICY_SERVICE_URL")))
            .transpose()?;

        let policy_service_timeout =
            Duration::from_millis(parse_number(&var, "POLICY_SERVICE_TIMEOUT_MS", 2000)?.max(1));

        let policy_alert_threshold = parse_number(&var, "POLICY_UNAVAILABLE_ALERT_THRESHOLD", 5)?;

        let policy_bindings = match var("AUTH_POLICY_BINDINGS") {
            Some(overrides) => PolicyBindings::with_overrides(&overrides).map_err(|err| {
                tracing::error!(error = %err, "AUTH_POLICY_BINDINGS rejected");
                ConfigError::Invalid("AUTH_POLICY_BINDINGS")
            })?,
            None => PolicyBindings::default(),
        };

        Ok(Self {
            addr,
            app_env,
            auth_issuer,
            auth_audience,
            allowed_algorithms,
            clock_skew_seconds,
            role_claims,
            key_source,
            key_rotation_overlap,
            policy_service_url,
            policy_service_timeout,
            policy_alert_threshold,
            policy_bindings,
        })
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            expected_issuer: self.auth_issuer.clone(),
            allowed_algorithms: self.allowed_algorithms.clone(),
            clock_skew_seconds: self.clock_skew_seconds,
            audience: self.auth_audience.clone(),
        }
    }
}

/// Comma separated JOSE names; `none` and unknown names are rejected, the list must not be empty.
fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, ConfigError> {
    const KEY: &str = "AUTH_ALLOWED_ALGORITHMS";
    let mut algorithms = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name).map_err(|_| ConfigError::Invalid(KEY))?;
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }
    if algorithms.is_empty() {
        return Err(ConfigError::Invalid(KEY));
    }
    Ok(algorithms)
}

fn parse_number(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match var(key) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
