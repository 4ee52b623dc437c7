use super::ApplicationError;
use crate::AppState;
use dust_core::domain::{session::Principal, tenant::Tenant};

#[derive(Debug, Clone)]
pub enum Requirement {
    SuperAdminOnly,
    /// The super admin, or the tenant principal of exactly this slug.
    ManageTenant(String),
}

pub fn authorize(principal: &Principal, requirement: Requirement) -> Result<(), ApplicationError> {
    match requirement {
        Requirement::SuperAdminOnly => {
            if principal.is_super_admin() {
                Ok(())
            } else {
                Err(ApplicationError::Forbidden(
                    "Super admin access required".into(),
                ))
            }
        }
        Requirement::ManageTenant(slug) => {
            if principal.can_manage_tenant(&slug) {
                Ok(())
            } else {
                Err(ApplicationError::Forbidden(format!(
                    "Not allowed to manage tenant '{}'",
                    slug
                )))
            }
        }
    }
}

/// Authorizes `principal` for `slug` and loads the tenant, so model and content routes
/// never reach a namespace the registry does not know.
pub async fn require_managed_tenant(
    app_state: &AppState,
    principal: &Principal,
    slug: &str,
) -> Result<Tenant, ApplicationError> {
    authorize(principal, Requirement::ManageTenant(slug.to_string()))?;
    app_state
        .tenants
        .find_tenant(slug)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("Tenant '{}' not found", slug)))
}
