//! Issuer key download: OIDC discovery + JWKS fetch.
//!
//! Only the background refresher calls into this module; request handling
//! never waits on the issuer.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::material::{KeyError, KeyMaterial, parse_jwks};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    jwks_uri: String,
}

#[derive(Debug, Clone)]
pub struct JwksClient {
    http: reqwest::Client,
    jwks_uri: Url,
}

impl JwksClient {
    pub fn new(jwks_uri: Url) -> Result<Self, KeyError> {
        Ok(Self {
            http: build_http_client()?,
            jwks_uri,
        })
    }

    /// Resolve `jwks_uri` from `<issuer>/.well-known/openid-configuration`.
    ///
    /// The document's `issuer` must equal the configured one (OIDC Discovery §4.3).
    pub async fn discover(issuer: &str) -> Result<Self, KeyError> {
        let http = build_http_client()?;
        let metadata_url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );

        debug!(url = %metadata_url, "fetching openid provider metadata");
        let response = http
            .get(&metadata_url)
            .send()
            .await
            .map_err(|e| KeyError::Discovery(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KeyError::Discovery(format!(
                "metadata endpoint returned {}",
                response.status()
            )));
        }

        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| KeyError::Discovery(e.to_string()))?;
        if metadata.issuer != issuer {
            return Err(KeyError::Discovery(format!(
                "metadata issuer '{}' does not match '{}'",
                metadata.issuer, issuer
            )));
        }

        let jwks_uri =
            Url::parse(&metadata.jwks_uri).map_err(|e| KeyError::Discovery(e.to_string()))?;
        info!(jwks_uri = %jwks_uri, "discovered issuer key set");

        Ok(Self { http, jwks_uri })
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    pub async fn fetch(&self) -> Result<Vec<(String, KeyMaterial)>, KeyError> {
        let response = self
            .http
            .get(self.jwks_uri.clone())
            .send()
            .await
            .map_err(|e| KeyError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KeyError::Fetch(format!(
                "jwks endpoint returned {}",
                response.status()
            )));
        }

        let document: serde_json::Value = response
            .json()
            .await
            .map_err(|e| KeyError::Fetch(e.to_string()))?;
        parse_jwks(&document)
    }
}

fn build_http_client() -> Result<reqwest::Client, KeyError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| KeyError::Fetch(format!("failed to build http client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::test_support::{ED25519_PUBLIC_X, spawn_server};
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;

    fn jwks_body() -> serde_json::Value {
        json!({
            "keys": [
                { "kid": "kc-1", "kty": "OKP", "crv": "Ed25519", "alg": "EdDSA", "use": "sig", "x": ED25519_PUBLIC_X }
            ]
        })
    }

    #[tokio::test]
    async fn fetches_and_parses_the_key_set() {
        let base = spawn_server(Router::new().route(
            "/certs",
            get(|| async { Json(jwks_body()) }),
        ))
        .await;

        let client = JwksClient::new(Url::parse(&format!("{base}/certs")).unwrap()).unwrap();
        let keys = client.fetch().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].0, "kc-1");
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let base = spawn_server(Router::new().route(
            "/certs",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;

        let client = JwksClient::new(Url::parse(&format!("{base}/certs")).unwrap()).unwrap();
        assert!(matches!(client.fetch().await, Err(KeyError::Fetch(_))));
    }

    #[tokio::test]
    async fn discovery_follows_jwks_uri_and_checks_issuer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let issuer = format!("{base}/realms/quarkus");

        let metadata = json!({
            "issuer": issuer,
            "jwks_uri": format!("{base}/realms/quarkus/protocol/openid-connect/certs"),
        });
        let router = Router::new()
            .route(
                "/realms/quarkus/.well-known/openid-configuration",
                get(move || {
                    let metadata = metadata.clone();
                    async move { Json(metadata) }
                }),
            )
            .route(
                "/realms/quarkus/protocol/openid-connect/certs",
                get(|| async { Json(jwks_body()) }),
            );
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = JwksClient::discover(&issuer).await.unwrap();
        assert!(client.jwks_uri().path().ends_with("/openid-connect/certs"));
        assert_eq!(client.fetch().await.unwrap().len(), 1);

        let wrong = JwksClient::discover(&format!("{base}/realms/quarkus/")).await;
        assert!(matches!(wrong, Err(KeyError::Discovery(_))));
    }
}
