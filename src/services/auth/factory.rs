/// Factory: build the `RequestGate` (and its key refresher) from application `Config`.
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::{Config, KeySource};
use crate::error::AppError;
use crate::services::auth::authz::{Authorizer, HttpPolicyClient, PolicyClient};
use crate::services::auth::gate::RequestGate;
use crate::services::auth::keys::{JwksClient, KeyMaterial, KeyRefresher, KeyStore};

pub struct AuthRuntime {
    pub gate: Arc<RequestGate>,
    /// Background JWKS refresh; `None` with a static key.
    pub refresher: Option<JoinHandle<()>>,
}

pub async fn build_auth(config: &Config) -> Result<AuthRuntime, AppError> {
    let store = Arc::new(KeyStore::new(config.key_rotation_overlap));

    let refresher = match &config.key_source {
        KeySource::Static { kid, pem, algorithm } => {
            let material = KeyMaterial::from_pem(pem, *algorithm)?;
            store.replace(vec![(kid.clone(), material)]);
            tracing::info!(kid = %kid, algorithm = ?algorithm, "using static verification key");
            None
        }
        KeySource::Jwks {
            uri,
            refresh_interval,
        } => {
            let client = match uri {
                Some(uri) => JwksClient::new(uri.clone())?,
                None => JwksClient::discover(&config.auth_issuer).await?,
            };
            tracing::info!(jwks_uri = %client.jwks_uri(), "using JWKS verification keys");

            let refresher = KeyRefresher::new(store.clone(), client, *refresh_interval);
            // The identity provider may still be starting; the refresher retries on its schedule.
            if let Err(err) = refresher.refresh_once().await {
                tracing::warn!(error = %err, "initial JWKS fetch failed; starting without keys");
            }
            Some(refresher.spawn())
        }
    };

    let policy_client = match &config.policy_service_url {
        Some(url) => {
            let client = HttpPolicyClient::new(url.clone(), config.policy_service_timeout)
                .map_err(|err| {
                    tracing::error!(error = %err, "policy service client could not be built");
                    AppError::Internal
                })?;
            Some(Arc::new(client) as Arc<dyn PolicyClient>)
        }
        None => {
            tracing::warn!("POLICY_SERVICE_URL not set; delegated policies will be denied");
            None
        }
    };

    let authorizer = Authorizer::new(
        policy_client,
        config.policy_service_timeout,
        config.policy_alert_threshold,
    );

    let gate = RequestGate::new(
        store,
        config.validation_policy(),
        config.role_claims.clone(),
        authorizer,
    );

    Ok(AuthRuntime {
        gate: Arc::new(gate),
        refresher,
    })
}
