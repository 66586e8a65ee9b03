/* Responsibility
 * - Ask an external policy decision point whether an identity may use a resource.
 * - Transport failures and unexpected answers surface as `PolicyError`; the caller fails closed.
 */

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::services::auth::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Denied,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy service unreachable: {0}")]
    Transport(String),
    #[error("policy service answered {0}")]
    Status(u16),
    #[error("policy service response unreadable: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait PolicyClient: Send + Sync {
    async fn check_policy(
        &self,
        identity: &Identity,
        policy: &str,
        resource_path: &str,
    ) -> Result<PolicyDecision, PolicyError>;
}

#[derive(Serialize)]
struct PolicyQuery<'a> {
    subject: &'a str,
    roles: Vec<&'a str>,
    policy: &'a str,
    resource: &'a str,
}

#[derive(Deserialize)]
struct PolicyAnswer {
    allowed: bool,
}

/// JSON over HTTP: `POST <url>` with the query, `200 {"allowed": bool}` back.
/// A plain `403` also counts as a denial.
#[derive(Debug, Clone)]
pub struct HttpPolicyClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpPolicyClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, PolicyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PolicyError::Transport(e.to_string()))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl PolicyClient for HttpPolicyClient {
    async fn check_policy(
        &self,
        identity: &Identity,
        policy: &str,
        resource_path: &str,
    ) -> Result<PolicyDecision, PolicyError> {
        let query = PolicyQuery {
            subject: identity.subject(),
            roles: identity.roles().iter().map(String::as_str).collect(),
            policy,
            resource: resource_path,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&query)
            .send()
            .await
            .map_err(|e| PolicyError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let answer: PolicyAnswer = response
                    .json()
                    .await
                    .map_err(|e| PolicyError::InvalidResponse(e.to_string()))?;
                Ok(if answer.allowed {
                    PolicyDecision::Allowed
                } else {
                    PolicyDecision::Denied
                })
            }
            StatusCode::FORBIDDEN => Ok(PolicyDecision::Denied),
            other => Err(PolicyError::Status(other.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::test_support::spawn_server;
    use axum::{Json, Router, http::StatusCode as HttpStatus, routing::post};
    use serde_json::{Value, json};

    fn client(base: &str) -> HttpPolicyClient {
        let url = Url::parse(&format!("{base}/v1/check")).unwrap();
        HttpPolicyClient::new(url, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn sends_identity_policy_and_resource() {
        let router = Router::new().route(
            "/v1/check",
            post(|Json(body): Json<Value>| async move {
                let allowed = body["subject"] == "alice"
                    && body["policy"] == "document-access"
                    && body["resource"] == "/api/v1/documents/42"
                    && body["roles"] == json!(["user"]);
                Json(json!({ "allowed": allowed }))
            }),
        );
        let base = spawn_server(router).await;
        let identity = Identity::for_tests("alice", &["user"]);

        let decision = client(&base)
            .check_policy(&identity, "document-access", "/api/v1/documents/42")
            .await
            .unwrap();
        assert_eq!(decision, PolicyDecision::Allowed);

        let decision = client(&base)
            .check_policy(&identity, "document-access", "/api/v1/documents/43")
            .await
            .unwrap();
        assert_eq!(decision, PolicyDecision::Denied);
    }

    #[tokio::test]
    async fn forbidden_is_a_denial_and_server_errors_are_failures() {
        let router = Router::new()
            .route("/v1/check", post(|| async { HttpStatus::FORBIDDEN }))
            .route("/broken/v1/check", post(|| async { HttpStatus::BAD_GATEWAY }))
            .route("/garbled/v1/check", post(|| async { "not json" }));
        let base = spawn_server(router).await;
        let identity = Identity::for_tests("alice", &[]);

        assert_eq!(
            client(&base)
                .check_policy(&identity, "p", "/x")
                .await
                .unwrap(),
            PolicyDecision::Denied
        );
        assert!(matches!(
            client(&format!("{base}/broken"))
                .check_policy(&identity, "p", "/x")
                .await,
            Err(PolicyError::Status(502))
        ));
        assert!(matches!(
            client(&format!("{base}/garbled"))
                .check_policy(&identity, "p", "/x")
                .await,
            Err(PolicyError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let result = client("http://127.0.0.1:9")
            .check_policy(&Identity::for_tests("alice", &[]), "p", "/x")
            .await;
        assert!(matches!(result, Err(PolicyError::Transport(_))));
    }
}
