use axum::http::StatusCode;

use super::authz::AuthorizationError;
use super::identity::Identity;
use super::token::ParseError;
use super::validator::ValidationError;

/// Final answer for one request.
#[derive(Debug, Clone)]
pub enum Verdict {
    Allowed(Identity),
    Denied(DenyReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Allowed(identity) => Some(identity),
            Self::Denied(_) => None,
        }
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allowed(_) => None,
            Self::Denied(reason) => Some(reason),
        }
    }
}

/// Why a request was refused. Kept for logs; callers only see the status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed credential")]
    MalformedCredential,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

impl DenyReason {
    /// 401 when the caller is not authenticated, 403 when authenticated but not allowed.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}
