pub mod auth;
pub mod tenant;

pub use auth::{bearer_token, session_auth};
pub use tenant::resolve_tenant_context;
