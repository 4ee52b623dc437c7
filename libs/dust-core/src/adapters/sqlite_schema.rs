use super::namespaces::TenantNamespaces;
use super::storage_fault;
use crate::domain::content_model::{ContentModel, Field, ModelKind, ModelSlug};
use crate::{CoreError, CoreResult, SchemaStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[derive(sqlx::FromRow, Debug)]
struct ModelRow {
    slug: String,
    name: String,
    kind: String,
    fields: String,
}

impl TryFrom<ModelRow> for ContentModel {
    type Error = CoreError;

    // Stored rows went through validation on the way in; a row that no longer parses
    // means the namespace itself is damaged.
    fn try_from(row: ModelRow) -> Result<Self, Self::Error> {
        let slug = ModelSlug::parse(&row.slug).map_err(|e| {
            CoreError::storage(format!("stored model slug '{}' is invalid", row.slug), e)
        })?;
        let kind = ModelKind::parse(&row.kind).ok_or_else(|| {
            CoreError::storage(
                format!("stored model '{}'", row.slug),
                format!("unknown model kind '{}'", row.kind),
            )
        })?;
        let fields: Vec<Field> = serde_json::from_str(&row.fields)
            .map_err(storage_fault(format!("decoding fields of model '{}'", row.slug)))?;
        Ok(ContentModel {
            slug,
            name: row.name,
            kind,
            fields,
        })
    }
}

/// Model metadata kept inside each tenant's own namespace.
#[derive(Debug, Clone)]
pub struct SqliteSchemaStore {
    namespaces: Arc<TenantNamespaces>,
}

impl SqliteSchemaStore {
    pub fn new(namespaces: Arc<TenantNamespaces>) -> Self {
        Self { namespaces }
    }
}

fn encode_fields(fields: &[Field]) -> CoreResult<String> {
    serde_json::to_string(fields).map_err(storage_fault("encoding model fields"))
}

#[async_trait]
impl SchemaStore for SqliteSchemaStore {
    async fn list_models(&self, tenant: &str) -> CoreResult<Vec<ContentModel>> {
        let ns = self.namespaces.handle(tenant).await?;
        let _read = ns.read().await;

        let rows: Vec<ModelRow> = sqlx::query_as(
            "SELECT slug, name, kind, fields FROM schema_models ORDER BY name ASC, slug ASC",
        )
        .fetch_all(ns.pool())
        .await
        .map_err(storage_fault(format!("listing models for tenant '{tenant}'")))?;

        rows.into_iter().map(ContentModel::try_from).collect()
    }

    async fn get_model(&self, tenant: &str, model_slug: &str) -> CoreResult<Option<ContentModel>> {
        let ns = self.namespaces.handle(tenant).await?;
        let _read = ns.read().await;

        let row: Option<ModelRow> =
            sqlx::query_as("SELECT slug, name, kind, fields FROM schema_models WHERE slug = ?")
                .bind(model_slug)
                .fetch_optional(ns.pool())
                .await
                .map_err(storage_fault(format!(
                    "loading model '{model_slug}' for tenant '{tenant}'"
                )))?;

        row.map(ContentModel::try_from).transpose()
    }

    async fn put_model(&self, tenant: &str, model: &ContentModel) -> CoreResult<()> {
        let fields = encode_fields(&model.fields)?;
        let ns = self.namespaces.handle(tenant).await?;
        let _write = ns.write().await;

        let inserted = sqlx::query(
            r#"
            INSERT INTO schema_models (slug, name, kind, fields)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(model.slug.as_str())
        .bind(&model.name)
        .bind(model.kind.as_str())
        .bind(fields)
        .execute(ns.pool())
        .await
        .map_err(storage_fault(format!(
            "saving model '{}' for tenant '{tenant}'",
            model.slug
        )))?;

        if inserted.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!(
                "Model with slug '{}' already exists",
                model.slug
            )));
        }
        debug!("Saved model {} for tenant {}", model.slug, tenant);
        Ok(())
    }

    async fn update_model_fields(
        &self,
        tenant: &str,
        model_slug: &ModelSlug,
        fields: &[Field],
    ) -> CoreResult<()> {
        let encoded = encode_fields(fields)?;
        let ns = self.namespaces.handle(tenant).await?;
        let _write = ns.write().await;

        let result = sqlx::query("UPDATE schema_models SET fields = ? WHERE slug = ?")
            .bind(encoded)
            .bind(model_slug.as_str())
            .execute(ns.pool())
            .await
            .map_err(storage_fault(format!(
                "updating fields of model '{model_slug}' for tenant '{tenant}'"
            )))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "Model '{}' not found",
                model_slug
            )));
        }
        Ok(())
    }

    async fn rename_model(
        &self,
        tenant: &str,
        model_slug: &ModelSlug,
        name: &str,
    ) -> CoreResult<()> {
        let ns = self.namespaces.handle(tenant).await?;
        let _write = ns.write().await;

        let result = sqlx::query("UPDATE schema_models SET name = ? WHERE slug = ?")
            .bind(name)
            .bind(model_slug.as_str())
            .execute(ns.pool())
            .await
            .map_err(storage_fault(format!(
                "renaming model '{model_slug}' for tenant '{tenant}'"
            )))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "Model '{}' not found",
                model_slug
            )));
        }
        Ok(())
    }

    async fn delete_model(&self, tenant: &str, model_slug: &ModelSlug) -> CoreResult<()> {
        let ns = self.namespaces.handle(tenant).await?;
        let _write = ns.write().await;

        let result = sqlx::query("DELETE FROM schema_models WHERE slug = ?")
            .bind(model_slug.as_str())
            .execute(ns.pool())
            .await
            .map_err(storage_fault(format!(
                "deleting model '{model_slug}' for tenant '{tenant}'"
            )))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "Model '{}' not found",
                model_slug
            )));
        }
        Ok(())
    }
}
