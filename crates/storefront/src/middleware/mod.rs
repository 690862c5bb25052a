//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request span with `request_id` field)
//! 3. Request ID (record on span and Sentry scope, echo in response)
//! 4. Security headers
//! 5. Session layer (tower-sessions)
//! 6. Rate limiting (governor, `/auth` routes only)
//! 7. Session gate (extractors in [`auth`], per handler)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    AdminGate, AuthRejection, OptionalAuth, RequireAdmin, RequireAuth, RequireRole, RequireRoot,
    RoleGate, RootGate, clear_current_user, set_current_user, wants_json,
};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, login_expiry};
