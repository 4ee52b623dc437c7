use chrono::{DateTime, Utc};
use serde::Serialize;

const SUPER_ADMIN_TAG: &str = "admin:";
const TENANT_TAG: &str = "tenant:";

/// Who a session belongs to. Super admins and tenant principals share one token
/// store; authorization always matches on the variant, never on string prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    SuperAdmin { username: String },
    Tenant { slug: String },
}

impl Principal {
    pub fn super_admin(username: impl Into<String>) -> Self {
        Principal::SuperAdmin {
            username: username.into(),
        }
    }

    pub fn tenant(slug: impl Into<String>) -> Self {
        Principal::Tenant { slug: slug.into() }
    }

    /// Storage form, e.g. `admin:root` or `tenant:acme`.
    pub fn encode(&self) -> String {
        match self {
            Principal::SuperAdmin { username } => format!("{SUPER_ADMIN_TAG}{username}"),
            Principal::Tenant { slug } => format!("{TENANT_TAG}{slug}"),
        }
    }

    pub fn decode(raw: &str) -> Option<Self> {
        if let Some(username) = raw.strip_prefix(SUPER_ADMIN_TAG) {
            return (!username.is_empty()).then(|| Principal::super_admin(username));
        }
        if let Some(slug) = raw.strip_prefix(TENANT_TAG) {
            return (!slug.is_empty()).then(|| Principal::tenant(slug));
        }
        None
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Principal::SuperAdmin { .. })
    }

    /// Super admins manage every tenant; a tenant principal only its own.
    pub fn can_manage_tenant(&self, tenant_slug: &str) -> bool {
        match self {
            Principal::SuperAdmin { .. } => true,
            Principal::Tenant { slug } => slug == tenant_slug,
        }
    }

    /// True only for the tenant principal of exactly `tenant_slug`.
    pub fn is_tenant(&self, tenant_slug: &str) -> bool {
        matches!(self, Principal::Tenant { slug } if slug == tenant_slug)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
}
