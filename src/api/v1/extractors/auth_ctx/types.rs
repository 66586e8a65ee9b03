/*
 * Responsibility
 * - The authenticated context handlers see
 * - Middleware builds it from an allowed verdict and stores it in request extensions
 */

use crate::services::auth::Identity;

/// Context attached to every request that passed the gate.
///
/// - `identity` is the validated caller (subject, roles, all claims)
/// - `operation` names the binding that let the request through
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub identity: Identity,
    pub operation: &'static str,
}

impl AuthCtx {
    pub fn new(identity: Identity, operation: &'static str) -> Self {
        Self {
            identity,
            operation,
        }
    }

    pub fn subject(&self) -> &str {
        self.identity.subject()
    }
}
