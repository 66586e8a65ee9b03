/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - gate: the bearer-token pipeline, bindings: operation -> requirement
 * - Held by Clone (everything inside is an Arc)
 */
use std::sync::Arc;

use crate::services::auth::{RequestGate, authz::PolicyBindings};

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub bindings: Arc<PolicyBindings>,
}

impl AppState {
    pub fn new(gate: Arc<RequestGate>, bindings: PolicyBindings) -> Self {
        Self {
            gate,
            bindings: Arc::new(bindings),
        }
    }
}
