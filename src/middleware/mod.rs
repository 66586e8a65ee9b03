/*
 * Responsibility
 * - middleware public interface
 * - auth::access::protect(...) per route group, http/security_headers for the whole app
 */
pub mod auth;
pub mod http;
pub mod security_headers;
