use std::{sync::Arc, time::Duration};

use super::bindings::PolicyRequirement;
use super::health::PolicyServiceHealth;
use super::policy_client::{PolicyClient, PolicyDecision};
use crate::services::auth::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("role not allowed")]
    RoleDenied,
    #[error("policy denied")]
    PolicyDenied,
    #[error("policy service unavailable")]
    PolicyServiceUnavailable,
}

/// Result of the local rules.
///
/// `Deferred` means an external decision is still needed; it borrows the
/// identity it was computed for, so the policy call is made for that caller.
#[derive(Debug, Clone)]
pub enum Decision<'a> {
    Allowed,
    Denied(AuthorizationError),
    Deferred {
        policy: &'a str,
        identity: &'a Identity,
    },
}

/// Pure local check: a role is decided here, a delegated policy is handed back.
pub fn authorize<'a>(identity: &'a Identity, requirement: &'a PolicyRequirement) -> Decision<'a> {
    match requirement {
        PolicyRequirement::Role(role) if identity.has_role(role) => Decision::Allowed,
        PolicyRequirement::Role(_) => Decision::Denied(AuthorizationError::RoleDenied),
        PolicyRequirement::Delegated { policy } => Decision::Deferred { policy, identity },
    }
}

/// Local rules plus the external policy service. Every unclear outcome denies.
pub struct Authorizer {
    policy_client: Option<Arc<dyn PolicyClient>>,
    timeout: Duration,
    health: PolicyServiceHealth,
}

impl Authorizer {
    pub fn new(
        policy_client: Option<Arc<dyn PolicyClient>>,
        timeout: Duration,
        alert_threshold: u64,
    ) -> Self {
        Self {
            policy_client,
            timeout,
            health: PolicyServiceHealth::new(alert_threshold),
        }
    }

    /// Role checks only; any delegated requirement is denied as unavailable.
    #[cfg(test)]
    pub fn local_only() -> Self {
        Self::new(None, Duration::from_secs(1), 1)
    }

    #[cfg(test)]
    pub fn health(&self) -> &PolicyServiceHealth {
        &self.health
    }

    pub async fn evaluate(
        &self,
        identity: &Identity,
        requirement: &PolicyRequirement,
        resource_path: &str,
    ) -> Result<(), AuthorizationError> {
        let (policy, identity) = match authorize(identity, requirement) {
            Decision::Allowed => return Ok(()),
            Decision::Denied(err) => return Err(err),
            Decision::Deferred { policy, identity } => (policy, identity),
        };

        let Some(client) = &self.policy_client else {
            tracing::warn!(policy = %policy, "no policy service configured for delegated policy");
            return Err(AuthorizationError::PolicyServiceUnavailable);
        };

        let answer = tokio::time::timeout(
            self.timeout,
            client.check_policy(identity, policy, resource_path),
        )
        .await;

        match answer {
            Ok(Ok(decision)) => {
                self.health.record_success();
                match decision {
                    PolicyDecision::Allowed => Ok(()),
                    PolicyDecision::Denied => Err(AuthorizationError::PolicyDenied),
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, policy = %policy, "policy check failed");
                self.health.record_failure();
                Err(AuthorizationError::PolicyServiceUnavailable)
            }
            Err(_) => {
                tracing::warn!(
                    policy = %policy,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "policy check timed out"
                );
                self.health.record_failure();
                Err(AuthorizationError::PolicyServiceUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::authz::policy_client::PolicyError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Answer(PolicyDecision),
        Fail,
        Hang,
    }

    struct StubPolicy {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl StubPolicy {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PolicyClient for StubPolicy {
        async fn check_policy(
            &self,
            _identity: &Identity,
            _policy: &str,
            _resource_path: &str,
        ) -> Result<PolicyDecision, PolicyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Answer(decision) => Ok(decision),
                Behaviour::Fail => Err(PolicyError::Status(500)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(PolicyDecision::Allowed)
                }
            }
        }
    }

    fn authorizer(stub: &Arc<StubPolicy>, threshold: u64) -> Authorizer {
        let client: Arc<dyn PolicyClient> = stub.clone();
        Authorizer::new(Some(client), Duration::from_millis(50), threshold)
    }

    #[test]
    fn role_requirements_are_decided_locally() {
        let user = Identity::for_tests("alice", &["user"]);
        assert!(matches!(
            authorize(&user, &PolicyRequirement::role("user")),
            Decision::Allowed
        ));
        assert!(matches!(
            authorize(&user, &PolicyRequirement::role("admin")),
            Decision::Denied(AuthorizationError::RoleDenied)
        ));
    }

    #[test]
    fn admin_role_does_not_imply_user() {
        let admin = Identity::for_tests("root", &["admin"]);
        assert!(matches!(
            authorize(&admin, &PolicyRequirement::role("user")),
            Decision::Denied(AuthorizationError::RoleDenied)
        ));
    }

    #[test]
    fn delegated_requirements_are_deferred() {
        let user = Identity::for_tests("alice", &["admin", "user"]);
        let requirement = PolicyRequirement::delegated("document-access");
        match authorize(&user, &requirement) {
            Decision::Deferred { policy, identity } => {
                assert_eq!(policy, "document-access");
                assert!(std::ptr::eq(identity, &user));
                assert_eq!(identity.subject(), "alice");
            }
            other => panic!("expected a deferred decision, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn role_checks_never_reach_the_policy_service() {
        let stub = StubPolicy::new(Behaviour::Answer(PolicyDecision::Allowed));
        let authz = authorizer(&stub, 5);
        let user = Identity::for_tests("alice", &["user"]);

        assert_eq!(
            authz
                .evaluate(&user, &PolicyRequirement::role("admin"), "/admin")
                .await,
            Err(AuthorizationError::RoleDenied)
        );
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn follows_the_policy_service_answer() {
        let user = Identity::for_tests("alice", &["user"]);
        let req = PolicyRequirement::delegated("document-access");

        let allow = StubPolicy::new(Behaviour::Answer(PolicyDecision::Allowed));
        assert_eq!(authorizer(&allow, 5).evaluate(&user, &req, "/d/1").await, Ok(()));

        let deny = StubPolicy::new(Behaviour::Answer(PolicyDecision::Denied));
        assert_eq!(
            authorizer(&deny, 5).evaluate(&user, &req, "/d/1").await,
            Err(AuthorizationError::PolicyDenied)
        );
    }

    #[tokio::test]
    async fn failures_and_timeouts_fail_closed() {
        let user = Identity::for_tests("alice", &["user"]);
        let req = PolicyRequirement::delegated("document-access");

        let failing = StubPolicy::new(Behaviour::Fail);
        assert_eq!(
            authorizer(&failing, 5).evaluate(&user, &req, "/d/1").await,
            Err(AuthorizationError::PolicyServiceUnavailable)
        );

        let hanging = StubPolicy::new(Behaviour::Hang);
        assert_eq!(
            authorizer(&hanging, 5).evaluate(&user, &req, "/d/1").await,
            Err(AuthorizationError::PolicyServiceUnavailable)
        );

        assert_eq!(
            Authorizer::local_only().evaluate(&user, &req, "/d/1").await,
            Err(AuthorizationError::PolicyServiceUnavailable)
        );
    }

    #[tokio::test]
    async fn repeated_failures_raise_the_health_alert() {
        let user = Identity::for_tests("alice", &["user"]);
        let req = PolicyRequirement::delegated("document-access");
        let failing = StubPolicy::new(Behaviour::Fail);
        let authz = authorizer(&failing, 3);

        for _ in 0..3 {
            let _ = authz.evaluate(&user, &req, "/d/1").await;
        }
        assert!(authz.health().is_alerting());
        assert_eq!(authz.health().consecutive_failures(), 3);
    }
}
