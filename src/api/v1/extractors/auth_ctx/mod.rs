/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Hand the authenticated context (AuthCtx) to handlers
 * - axum plumbing lives in core, the type itself in types
 */

mod core;
mod types;

pub use core::AuthCtxExtractor;
pub use types::AuthCtx;
