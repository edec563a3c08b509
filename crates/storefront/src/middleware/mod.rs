//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (record on span and Sentry scope)
//! 4. Session layer (tower-sessions, in-memory store, signed cookie)
//! 5. CSP nonce (per-request nonce for the inline HTMX config)
//! 6. Security headers (CSP, frame and sniffing protection)
//! 7. Rate limiting (governor), on auth and cart mutation routes only

pub mod auth;
pub mod csp;
pub mod page_context;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{AuthRejection, LOGIN_PATH, RequireAdmin, RequireAuth};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use page_context::PageContext;
pub use rate_limit::{auth_rate_limiter, cart_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
