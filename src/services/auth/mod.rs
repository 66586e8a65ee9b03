pub mod authz;
pub mod factory;
pub mod gate;
pub mod identity;
pub mod keys;
pub mod token;
pub mod validator;
pub mod verdict;

#[cfg(test)]
pub(crate) mod test_support;

pub use factory::{AuthRuntime, build_auth};
pub use gate::{GateOutcome, GateStage, RequestGate};
pub use identity::Identity;
pub use verdict::{DenyReason, Verdict};
