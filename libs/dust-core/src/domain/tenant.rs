use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Tenant slugs double as DNS labels, so they share the label length limit.
pub const MAX_TENANT_SLUG_LEN: usize = 63;

// --- Tenant ---

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Tenant {
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display copy for administrators. Never consulted for authentication.
    pub password_plaintext: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub slug: String,
    pub name: String,
    pub password_hash: String,
    pub password_plaintext: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub password_plaintext: Option<String>,
}

impl TenantUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password_hash.is_none() && self.password_plaintext.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SuperAdmin {
    pub username: String,
    pub password_hash: String,
}

// --- Validation ---

pub fn is_valid_tenant_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_TENANT_SLUG_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub fn validate_tenant_slug(slug: &str) -> CoreResult<()> {
    if is_valid_tenant_slug(slug) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Tenant slug '{}' must be 1-{} characters of lowercase letters, numbers, and hyphens",
            slug, MAX_TENANT_SLUG_LEN
        )))
    }
}

pub fn validate_tenant_name(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Tenant name cannot be empty".into()));
    }
    Ok(())
}
