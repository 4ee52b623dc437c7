use async_trait::async_trait;
use std::error::Error as StdError;

// Declare modules
pub mod adapters;
pub mod domain;
pub mod resolver;
pub mod services;

use domain::content_model::{ContentModel, Field, ModelSlug};
use domain::record::{ContentRecord, RecordPayload};
use domain::session::{Principal, Session};
use domain::tenant::{NewTenant, SuperAdmin, Tenant, TenantUpdate};

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The error classes every public operation reports.
///
/// `StorageFault` is the only class that signals an unhealthy tenant namespace (or the
/// shared system store); the other four describe a problem with the request itself.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Storage fault: {context}: {source}")]
    StorageFault {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl CoreError {
    pub fn storage(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CoreError::StorageFault {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_storage_fault(&self) -> bool {
        matches!(self, CoreError::StorageFault { .. })
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// Port for the process-wide tenant registry
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn list(&self) -> CoreResult<Vec<Tenant>>;
    async fn get(&self, slug: &str) -> CoreResult<Option<Tenant>>;

    /// Persists the tenant and provisions its storage namespace before returning.
    async fn create(&self, tenant: NewTenant) -> CoreResult<Tenant>;

    /// Only `name` and the credential are mutable; the slug is the identity.
    async fn update(&self, slug: &str, update: TenantUpdate) -> CoreResult<Tenant>;

    /// Removes the registry row and the whole namespace. Irreversible.
    async fn delete(&self, slug: &str) -> CoreResult<()>;
}

// Port for the shared session token store
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, principal: &Principal) -> CoreResult<String>;
    async fn get_session(&self, token: &str) -> CoreResult<Option<Session>>;
    async fn delete_session(&self, token: &str) -> CoreResult<()>;
}

// Port for the single super-admin credential
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn get_super_admin(&self) -> CoreResult<Option<SuperAdmin>>;
    async fn create_super_admin(&self, username: &str, password_hash: &str) -> CoreResult<()>;
}

// Port for per-tenant content model metadata. Performs no structural work.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn list_models(&self, tenant: &str) -> CoreResult<Vec<ContentModel>>;
    async fn get_model(&self, tenant: &str, model_slug: &str) -> CoreResult<Option<ContentModel>>;
    async fn put_model(&self, tenant: &str, model: &ContentModel) -> CoreResult<()>;
    async fn update_model_fields(
        &self,
        tenant: &str,
        model_slug: &ModelSlug,
        fields: &[Field],
    ) -> CoreResult<()>;
    async fn rename_model(&self, tenant: &str, model_slug: &ModelSlug, name: &str)
    -> CoreResult<()>;
    async fn delete_model(&self, tenant: &str, model_slug: &ModelSlug) -> CoreResult<()>;
}

/// Port for the physical record structures backing content models.
///
/// Implementations may assume the model they are handed has already been validated:
/// every identifier it carries is safe to interpolate into a statement.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    async fn provision(&self, tenant: &str, model: &ContentModel) -> CoreResult<()>;

    /// Brings the structure in line with `model.fields`. Additive only.
    async fn reconcile(&self, tenant: &str, model: &ContentModel) -> CoreResult<()>;

    async fn drop_structure(&self, tenant: &str, model_slug: &ModelSlug) -> CoreResult<()>;

    async fn list_records(&self, tenant: &str, model: &ContentModel)
    -> CoreResult<Vec<ContentRecord>>;
    async fn get_record(
        &self,
        tenant: &str,
        model: &ContentModel,
        id: i64,
    ) -> CoreResult<Option<ContentRecord>>;
    async fn get_singleton(
        &self,
        tenant: &str,
        model: &ContentModel,
    ) -> CoreResult<Option<ContentRecord>>;
    async fn create_record(
        &self,
        tenant: &str,
        model: &ContentModel,
        payload: &RecordPayload,
    ) -> CoreResult<i64>;
    async fn update_record(
        &self,
        tenant: &str,
        model: &ContentModel,
        id: i64,
        payload: &RecordPayload,
    ) -> CoreResult<()>;
    async fn upsert_singleton(
        &self,
        tenant: &str,
        model: &ContentModel,
        payload: &RecordPayload,
    ) -> CoreResult<()>;
    async fn delete_record(&self, tenant: &str, model: &ContentModel, id: i64) -> CoreResult<()>;
}
