//! Bearer token check for protected routes: run the gate, put `AuthCtx` into extensions.
//!
//! Each protected group of routes is bound to one operation name; the requirement
//! comes from `AppState::bindings`, so it is fixed when the router is built.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::config::ConfigError;
use crate::error::AppError;
use crate::services::auth::{Verdict, authz::PolicyRequirement};
use crate::state::AppState;

#[derive(Clone)]
struct Guard {
    state: AppState,
    operation: &'static str,
    requirement: Arc<PolicyRequirement>,
}

/// Protect every route of `router` with the requirement bound to `operation`.
///
/// ```ignore
/// let me = Router::new().route("/me", get(me));
/// let me = middleware::auth::access::protect(me, state.clone(), PROFILE_READ)?;
/// ```
pub fn protect(
    router: Router<AppState>,
    state: AppState,
    operation: &'static str,
) -> Result<Router<AppState>, ConfigError> {
    let requirement = state
        .bindings
        .requirement_for(operation)
        .cloned()
        .ok_or(ConfigError::Missing(operation))?;

    tracing::debug!(operation, requirement = %requirement, "protecting routes");

    let guard = Guard {
        state,
        operation,
        requirement: Arc::new(requirement),
    };

    // route_layer: unmatched paths still 404 instead of 401
    Ok(router.route_layer(middleware::from_fn_with_state(guard, access_middleware)))
}

async fn access_middleware(
    State(guard): State<Guard>,
    OriginalUri(uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let verdict = guard
        .state
        .gate
        .handle(req.headers(), uri.path(), &guard.requirement)
        .await;

    match verdict {
        Verdict::Allowed(identity) => {
            req.extensions_mut()
                .insert(AuthCtx::new(identity, guard.operation));
            Ok(next.run(req).await)
        }
        Verdict::Denied(reason) => Err(reason.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::extractors::AuthCtxExtractor;
    use crate::services::auth::authz::{Authorizer, PolicyBindings, bindings::ADMIN_READ};
    use crate::services::auth::gate::RequestGate;
    use crate::services::auth::test_support::{KID, fresh_claims, policy, sign_hs256, test_keys};
    use axum::http::{StatusCode, header};
    use axum::routing::get;
    use tower::ServiceExt;

    fn state() -> AppState {
        let gate = RequestGate::new(
            Arc::new(test_keys()),
            policy(),
            vec!["groups".to_string()],
            Authorizer::local_only(),
        );
        AppState::new(Arc::new(gate), PolicyBindings::default())
    }

    fn app() -> Router {
        let state = state();
        let admin = Router::new().route(
            "/admin",
            get(|AuthCtxExtractor(ctx): AuthCtxExtractor| async move {
                format!("{}:{}", ctx.operation, ctx.subject())
            }),
        );
        let admin = protect(admin, state.clone(), ADMIN_READ).unwrap();
        Router::new()
            .route("/open", get(|| async { "open" }))
            .merge(admin)
            .with_state(state)
    }

    fn request(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn admin_token_reaches_the_handler() {
        let token = sign_hs256(KID, &fresh_claims(&["admin"]));
        let response = app().oneshot(request("/admin", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"admin.read:alice");
    }

    #[tokio::test]
    async fn missing_token_is_401_with_challenge() {
        let response = app().oneshot(request("/admin", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[tokio::test]
    async fn wrong_role_is_403() {
        let token = sign_hs256(KID, &fresh_claims(&["user"]));
        let response = app().oneshot(request("/admin", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unprotected_and_unknown_routes_are_untouched() {
        let response = app().oneshot(request("/open", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app().oneshot(request("/nowhere", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unbound_operation_is_a_config_error() {
        let result = protect(Router::new(), state(), "billing.write");
        assert_eq!(result.err(), Some(ConfigError::Missing("billing.write")));
    }
}
