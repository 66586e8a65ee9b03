pub mod claims;
pub mod parser;

pub use claims::{ClaimSet, ClaimValue};
pub use parser::{ParseError, RawToken, TokenHeader, UnvalidatedClaims, parse};
