pub mod bindings;
pub mod engine;
pub mod health;
pub mod policy_client;

pub use bindings::{BindingError, PolicyBindings, PolicyRequirement};
pub use engine::{AuthorizationError, Authorizer, Decision, authorize};
pub use health::PolicyServiceHealth;
pub use policy_client::{HttpPolicyClient, PolicyClient, PolicyDecision, PolicyError};
