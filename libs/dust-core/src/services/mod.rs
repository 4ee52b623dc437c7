pub mod auth;
pub mod content;
pub mod tenants;

pub use auth::{AuthService, hash_password, verify_password};
pub use content::{ContentService, ContentView, ModelPatch};
pub use tenants::TenantService;
