pub mod jwks;
pub mod material;
pub mod refresh;
pub mod store;

pub use jwks::JwksClient;
pub use material::{KeyError, KeyMaterial, parse_jwks};
pub use refresh::KeyRefresher;
pub use store::{KeyProvider, KeySnapshot, KeyStore, RotationSummary};
