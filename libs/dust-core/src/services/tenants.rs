use super::auth::{hash_password_blocking, validate_password};
use crate::domain::tenant::{NewTenant, Tenant, TenantUpdate, validate_tenant_name, validate_tenant_slug};
use crate::{CoreResult, TenantRegistry};
use std::sync::Arc;

/// Tenant administration: credential hashing in front of the registry.
#[derive(Clone)]
pub struct TenantService {
    registry: Arc<dyn TenantRegistry>,
}

impl TenantService {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self { registry }
    }

    pub async fn list_tenants(&self) -> CoreResult<Vec<Tenant>> {
        self.registry.list().await
    }

    pub async fn find_tenant(&self, slug: &str) -> CoreResult<Option<Tenant>> {
        self.registry.get(slug).await
    }

    pub async fn create_tenant(&self, slug: &str, name: &str, password: &str) -> CoreResult<Tenant> {
        validate_tenant_slug(slug)?;
        validate_tenant_name(name)?;
        validate_password(password)?;

        let password_hash = hash_password_blocking(password.to_string()).await?;
        self.registry
            .create(NewTenant {
                slug: slug.to_string(),
                name: name.trim().to_string(),
                password_hash,
                password_plaintext: Some(password.to_string()),
            })
            .await
    }

    /// Changes the display name and/or the credential. The slug never changes.
    pub async fn update_tenant(
        &self,
        slug: &str,
        name: Option<&str>,
        password: Option<&str>,
    ) -> CoreResult<Tenant> {
        let mut update = TenantUpdate::default();
        if let Some(name) = name {
            validate_tenant_name(name)?;
            update.name = Some(name.trim().to_string());
        }
        if let Some(password) = password {
            validate_password(password)?;
            update.password_hash = Some(hash_password_blocking(password.to_string()).await?);
            update.password_plaintext = Some(password.to_string());
        }
        self.registry.update(slug, update).await
    }

    pub async fn delete_tenant(&self, slug: &str) -> CoreResult<()> {
        self.registry.delete(slug).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use crate::adapters::{SqliteSystemStore, TenantNamespaces};
    use crate::services::auth::verify_password;
    use tempfile::TempDir;

    async fn setup_service() -> (TenantService, Arc<TenantNamespaces>, TempDir) {
        let dir = TempDir::new().unwrap();
        let namespaces = Arc::new(TenantNamespaces::new(dir.path()));
        let store = SqliteSystemStore::open(dir.path(), namespaces.clone())
            .await
            .unwrap();
        (TenantService::new(Arc::new(store)), namespaces, dir)
    }

    #[tokio::test]
    async fn test_create_hashes_credential() {
        let (service, namespaces, _dir) = setup_service().await;

        let tenant = service
            .create_tenant("acme", "Acme Inc", "acme-password")
            .await
            .unwrap();
        assert_ne!(tenant.password_hash, "acme-password");
        assert!(verify_password("acme-password", &tenant.password_hash));
        assert_eq!(tenant.password_plaintext.as_deref(), Some("acme-password"));
        assert!(namespaces.namespace_dir("acme").is_dir());

        assert!(matches!(
            service.create_tenant("acme", "Again", "acme-password").await,
            Err(CoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_slug() {
        let (service, _namespaces, _dir) = setup_service().await;
        match service.create_tenant("Acme!", "Acme", "acme-password").await {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("lowercase")),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_name_and_password() {
        let (service, _namespaces, _dir) = setup_service().await;
        service
            .create_tenant("acme", "Acme Inc", "acme-password")
            .await
            .unwrap();

        let renamed = service
            .update_tenant("acme", Some("Acme Corp"), None)
            .await
            .unwrap();
        assert_eq!(renamed.name, "Acme Corp");
        assert!(verify_password("acme-password", &renamed.password_hash));

        let rotated = service
            .update_tenant("acme", None, Some("new-password"))
            .await
            .unwrap();
        assert_eq!(rotated.name, "Acme Corp");
        assert!(verify_password("new-password", &rotated.password_hash));
        assert!(!verify_password("acme-password", &rotated.password_hash));
    }

    #[tokio::test]
    async fn test_delete_tenant() {
        let (service, namespaces, _dir) = setup_service().await;
        service
            .create_tenant("acme", "Acme Inc", "acme-password")
            .await
            .unwrap();

        service.delete_tenant("acme").await.unwrap();
        assert!(service.find_tenant("acme").await.unwrap().is_none());
        assert!(!namespaces.namespace_dir("acme").exists());
        assert!(matches!(
            service.delete_tenant("acme").await,
            Err(CoreError::NotFound(_))
        ));
    }
}
