//! Validation and dispatch in front of the schema store and the storage engine.
//!
//! Every payload is checked against the model's *current* field list here, so the engine
//! only ever sees known, validated attribute names.

use crate::domain::content_model::{
    ContentModel, FieldDefinition, ModelDefinition, ModelKind, ModelSlug, validate_fields,
};
use crate::domain::record::{ContentRecord, RecordPayload};
use crate::{CoreError, CoreResult, SchemaStore, StorageEngine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Partial update of a model. `kind` is accepted only so a change can be rejected explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<ModelKind>,
    #[serde(default)]
    pub fields: Option<Vec<FieldDefinition>>,
}

/// Content of a model as the read API returns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentView {
    Collection(Vec<ContentRecord>),
    Singleton(Option<ContentRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequiredCheck {
    /// Every required field must be present (new rows).
    All,
    /// Only required fields present in the payload are checked (partial updates).
    Provided,
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn textual(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Turns a JSON object into a payload for `model`, in field order.
///
/// An `id` key is ignored; any other key that is not a current field is rejected.
fn build_payload(
    model: &ContentModel,
    data: &Map<String, Value>,
    check: RequiredCheck,
) -> CoreResult<RecordPayload> {
    if let Some(unknown) = data
        .keys()
        .find(|key| key.as_str() != "id" && model.field(key).is_none())
    {
        return Err(CoreError::Validation(format!(
            "Unknown field '{}' for model '{}'",
            unknown, model.slug
        )));
    }

    let mut payload = RecordPayload::new();
    for field in &model.fields {
        let name = field.name.as_str();
        let Some(raw) = data.get(name) else {
            if field.required && check == RequiredCheck::All {
                return Err(CoreError::Validation(format!("Field '{}' is required", name)));
            }
            continue;
        };

        let value = textual(raw);
        if field.required && is_blank(value.as_deref()) {
            return Err(CoreError::Validation(format!("Field '{}' is required", name)));
        }
        if let (Some(max), Some(text)) = (field.max_length, value.as_deref()) {
            if field.field_type.is_text() && text.chars().count() > max as usize {
                return Err(CoreError::Validation(format!(
                    "Field '{}' exceeds the maximum length of {} characters",
                    name, max
                )));
            }
        }
        payload.set(field.name.clone(), value);
    }
    Ok(payload)
}

#[derive(Clone)]
pub struct ContentService {
    schemas: Arc<dyn SchemaStore>,
    engine: Arc<dyn StorageEngine>,
}

impl ContentService {
    pub fn new(schemas: Arc<dyn SchemaStore>, engine: Arc<dyn StorageEngine>) -> Self {
        Self { schemas, engine }
    }

    async fn require_model(&self, tenant: &str, model_slug: &str) -> CoreResult<ContentModel> {
        ModelSlug::parse(model_slug)?;
        self.schemas
            .get_model(tenant, model_slug)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Model '{}' not found", model_slug)))
    }

    fn require_kind(model: &ContentModel, kind: ModelKind, operation: &str) -> CoreResult<()> {
        if model.kind == kind {
            return Ok(());
        }
        Err(CoreError::InvalidOperation(format!(
            "Cannot {} on {} model '{}'",
            operation,
            model.kind.as_str(),
            model.slug
        )))
    }

    // --- Models ---

    pub async fn list_models(&self, tenant: &str) -> CoreResult<Vec<ContentModel>> {
        self.schemas.list_models(tenant).await
    }

    pub async fn find_model(&self, tenant: &str, model_slug: &str) -> CoreResult<Option<ContentModel>> {
        ModelSlug::parse(model_slug)?;
        self.schemas.get_model(tenant, model_slug).await
    }

    pub async fn create_model(
        &self,
        tenant: &str,
        definition: ModelDefinition,
    ) -> CoreResult<ContentModel> {
        let model = definition.validate()?;
        if self.schemas.get_model(tenant, model.slug.as_str()).await?.is_some() {
            return Err(CoreError::Conflict(format!(
                "Model with slug '{}' already exists",
                model.slug
            )));
        }

        // Provisioning fails with Conflict if a concurrent create got there first.
        self.engine.provision(tenant, &model).await?;
        if let Err(e) = self.schemas.put_model(tenant, &model).await {
            if let Err(cleanup) = self.engine.drop_structure(tenant, &model.slug).await {
                error!(
                    "Model {} metadata was not saved and its table could not be dropped: {}",
                    model.slug, cleanup
                );
            }
            return Err(e);
        }

        info!("Created {} model {} for tenant {}", model.kind.as_str(), model.slug, tenant);
        Ok(model)
    }

    /// Applies a rename and/or a new field list. Structure is reconciled before the
    /// metadata changes, so stored fields always have columns.
    pub async fn update_model(
        &self,
        tenant: &str,
        model_slug: &str,
        patch: ModelPatch,
    ) -> CoreResult<ContentModel> {
        let mut model = self.require_model(tenant, model_slug).await?;

        if let Some(kind) = patch.kind {
            if kind != model.kind {
                return Err(CoreError::InvalidOperation(format!(
                    "Model '{}' is a {} and its kind cannot be changed",
                    model.slug,
                    model.kind.as_str()
                )));
            }
        }

        let name = match patch.name {
            Some(name) if name.trim().is_empty() => {
                return Err(CoreError::Validation("Model name cannot be empty".into()));
            }
            other => other,
        };

        if let Some(definitions) = patch.fields {
            model.fields = validate_fields(definitions)?;
            self.engine.reconcile(tenant, &model).await?;
            self.schemas
                .update_model_fields(tenant, &model.slug, &model.fields)
                .await?;
            debug!("Updated fields of model {} for tenant {}", model.slug, tenant);
        }

        if let Some(name) = name {
            self.schemas.rename_model(tenant, &model.slug, &name).await?;
            model.name = name;
        }

        Ok(model)
    }

    /// Drops the structure first; a retry after a partial failure finishes the job.
    pub async fn delete_model(&self, tenant: &str, model_slug: &str) -> CoreResult<()> {
        let model = self.require_model(tenant, model_slug).await?;

        self.engine.drop_structure(tenant, &model.slug).await?;
        if let Err(e) = self.schemas.delete_model(tenant, &model.slug).await {
            error!(
                "Model {} table was dropped but its metadata could not be deleted: {}",
                model.slug, e
            );
            return Err(CoreError::storage(
                format!("model '{}' table dropped but metadata deletion failed", model.slug),
                e,
            ));
        }

        info!("Deleted model {} for tenant {}", model.slug, tenant);
        Ok(())
    }

    // --- Records ---

    pub async fn read_content(&self, tenant: &str, model_slug: &str) -> CoreResult<ContentView> {
        let model = self.require_model(tenant, model_slug).await?;
        match model.kind {
            ModelKind::Collection => Ok(ContentView::Collection(
                self.engine.list_records(tenant, &model).await?,
            )),
            ModelKind::Singleton => Ok(ContentView::Singleton(
                self.engine.get_singleton(tenant, &model).await?,
            )),
        }
    }

    pub async fn list_records(&self, tenant: &str, model_slug: &str) -> CoreResult<Vec<ContentRecord>> {
        let model = self.require_model(tenant, model_slug).await?;
        Self::require_kind(&model, ModelKind::Collection, "list records")?;
        self.engine.list_records(tenant, &model).await
    }

    pub async fn find_record(
        &self,
        tenant: &str,
        model_slug: &str,
        id: i64,
    ) -> CoreResult<Option<ContentRecord>> {
        let model = self.require_model(tenant, model_slug).await?;
        Self::require_kind(&model, ModelKind::Collection, "fetch a record by id")?;
        self.engine.get_record(tenant, &model, id).await
    }

    pub async fn find_singleton(
        &self,
        tenant: &str,
        model_slug: &str,
    ) -> CoreResult<Option<ContentRecord>> {
        let model = self.require_model(tenant, model_slug).await?;
        Self::require_kind(&model, ModelKind::Singleton, "read the singleton")?;
        self.engine.get_singleton(tenant, &model).await
    }

    pub async fn create_record(
        &self,
        tenant: &str,
        model_slug: &str,
        data: &Map<String, Value>,
    ) -> CoreResult<i64> {
        let model = self.require_model(tenant, model_slug).await?;
        Self::require_kind(&model, ModelKind::Collection, "create a record")?;
        let payload = build_payload(&model, data, RequiredCheck::All)?;

        let id = self.engine.create_record(tenant, &model, &payload).await?;
        debug!("Created record {} in {} for tenant {}", id, model.slug, tenant);
        Ok(id)
    }

    pub async fn update_record(
        &self,
        tenant: &str,
        model_slug: &str,
        id: i64,
        data: &Map<String, Value>,
    ) -> CoreResult<()> {
        let model = self.require_model(tenant, model_slug).await?;
        Self::require_kind(&model, ModelKind::Collection, "update a record by id")?;
        let payload = build_payload(&model, data, RequiredCheck::Provided)?;

        self.engine.update_record(tenant, &model, id, &payload).await?;
        debug!("Updated record {} in {} for tenant {}", id, model.slug, tenant);
        Ok(())
    }

    /// Writes only the given keys. The first write must carry every required field.
    pub async fn upsert_singleton(
        &self,
        tenant: &str,
        model_slug: &str,
        data: &Map<String, Value>,
    ) -> CoreResult<()> {
        let model = self.require_model(tenant, model_slug).await?;
        Self::require_kind(&model, ModelKind::Singleton, "upsert the singleton")?;

        let check = match self.engine.get_singleton(tenant, &model).await? {
            Some(_) => RequiredCheck::Provided,
            None => RequiredCheck::All,
        };
        let payload = build_payload(&model, data, check)?;

        self.engine.upsert_singleton(tenant, &model, &payload).await?;
        debug!("Upserted singleton {} for tenant {}", model.slug, tenant);
        Ok(())
    }

    pub async fn delete_record(&self, tenant: &str, model_slug: &str, id: i64) -> CoreResult<()> {
        let model = self.require_model(tenant, model_slug).await?;
        Self::require_kind(&model, ModelKind::Collection, "delete a record")?;

        self.engine.delete_record(tenant, &model, id).await?;
        debug!("Deleted record {} in {} for tenant {}", id, model.slug, tenant);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SqliteSchemaStore, SqliteStorageEngine, TenantNamespaces};
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup_service() -> (ContentService, TempDir) {
        let dir = TempDir::new().unwrap();
        let namespaces = Arc::new(TenantNamespaces::new(dir.path()));
        namespaces.provision("a").await.unwrap();
        namespaces.provision("b").await.unwrap();
        let service = ContentService::new(
            Arc::new(SqliteSchemaStore::new(namespaces.clone())),
            Arc::new(SqliteStorageEngine::new(namespaces)),
        );
        (service, dir)
    }

    fn definition(value: Value) -> ModelDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    async fn create_posts(service: &ContentService, tenant: &str) {
        service
            .create_model(
                tenant,
                definition(json!({
                    "slug": "posts",
                    "name": "Posts",
                    "kind": "collection",
                    "fields": [
                        { "name": "title", "type": "text", "required": true, "max_length": 10 },
                        { "name": "body", "type": "markdown" },
                        { "name": "tags", "type": "tags" }
                    ]
                })),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_model_rejects_bad_slug_and_duplicates() {
        let (service, _dir) = setup_service().await;
        let bad = definition(json!({ "slug": "my-posts", "name": "Posts", "kind": "collection" }));
        assert!(matches!(
            service.create_model("a", bad).await,
            Err(CoreError::Validation(_))
        ));

        create_posts(&service, "a").await;
        let dup = definition(json!({ "slug": "posts", "name": "Again", "kind": "singleton" }));
        assert!(matches!(
            service.create_model("a", dup).await,
            Err(CoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_required_field_enforcement() {
        let (service, _dir) = setup_service().await;
        create_posts(&service, "a").await;

        match service.create_record("a", "posts", &data(json!({}))).await {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("title")),
            other => panic!("Expected Validation error, got {:?}", other),
        }
        assert!(matches!(
            service.create_record("a", "posts", &data(json!({ "title": "   " }))).await,
            Err(CoreError::Validation(_))
        ));

        let id = service
            .create_record("a", "posts", &data(json!({ "title": "x" })))
            .await
            .unwrap();

        // Partial updates only check the keys they carry.
        service
            .update_record("a", "posts", id, &data(json!({ "body": "Hello" })))
            .await
            .unwrap();
        assert!(matches!(
            service
                .update_record("a", "posts", id, &data(json!({ "title": null })))
                .await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_payload_rules() {
        let (service, _dir) = setup_service().await;
        create_posts(&service, "a").await;

        match service
            .create_record("a", "posts", &data(json!({ "title": "x", "author": "me" })))
            .await
        {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("author")),
            other => panic!("Expected Validation error, got {:?}", other),
        }
        assert!(matches!(
            service
                .create_record("a", "posts", &data(json!({ "title": "far too long a title" })))
                .await,
            Err(CoreError::Validation(_))
        ));

        let id = service
            .create_record(
                "a",
                "posts",
                &data(json!({ "id": 99, "title": "0", "tags": ["news", "rust"] })),
            )
            .await
            .unwrap();
        assert_ne!(id, 99);

        let record = service.find_record("a", "posts", id).await.unwrap().unwrap();
        assert_eq!(record.get("title"), Some("0"));
        assert_eq!(record.get("tags"), Some(r#"["news","rust"]"#));
        assert_eq!(record.get("body"), None);
    }

    #[tokio::test]
    async fn test_singleton_semantics() {
        let (service, _dir) = setup_service().await;
        service
            .create_model(
                "a",
                definition(json!({
                    "slug": "settings",
                    "name": "Settings",
                    "type": "singleton",
                    "fields": [
                        { "name": "site_name", "type": "text", "required": true },
                        { "name": "tagline", "type": "text" }
                    ]
                })),
            )
            .await
            .unwrap();

        assert_eq!(
            service.read_content("a", "settings").await.unwrap(),
            ContentView::Singleton(None)
        );
        assert!(matches!(
            service.create_record("a", "settings", &data(json!({}))).await,
            Err(CoreError::InvalidOperation(_))
        ));
        assert!(matches!(
            service.delete_record("a", "settings", 1).await,
            Err(CoreError::InvalidOperation(_))
        ));

        // The first write must carry every required field.
        assert!(matches!(
            service
                .upsert_singleton("a", "settings", &data(json!({ "tagline": "Hi" })))
                .await,
            Err(CoreError::Validation(_))
        ));
        service
            .upsert_singleton(
                "a",
                "settings",
                &data(json!({ "site_name": "Acme", "tagline": "Hi" })),
            )
            .await
            .unwrap();
        service
            .upsert_singleton("a", "settings", &data(json!({ "tagline": "Bye" })))
            .await
            .unwrap();

        let record = service.find_singleton("a", "settings").await.unwrap().unwrap();
        assert_eq!(record.get("site_name"), Some("Acme"));
        assert_eq!(record.get("tagline"), Some("Bye"));
    }

    #[tokio::test]
    async fn test_update_model_reconciles_and_rejects_kind_change() {
        let (service, _dir) = setup_service().await;
        service
            .create_model(
                "a",
                definition(json!({
                    "slug": "notes",
                    "name": "Notes",
                    "kind": "collection",
                    "fields": [
                        { "name": "a", "type": "text" },
                        { "name": "b", "type": "text" }
                    ]
                })),
            )
            .await
            .unwrap();
        let id = service
            .create_record("a", "notes", &data(json!({ "a": "1", "b": "2" })))
            .await
            .unwrap();

        let patch: ModelPatch = serde_json::from_value(json!({ "kind": "singleton" })).unwrap();
        assert!(matches!(
            service.update_model("a", "notes", patch).await,
            Err(CoreError::InvalidOperation(_))
        ));

        let patch: ModelPatch = serde_json::from_value(json!({
            "name": "Jottings",
            "fields": [
                { "name": "a", "type": "text" },
                { "name": "b", "type": "text" },
                { "name": "c", "type": "text" }
            ]
        }))
        .unwrap();
        let updated = service.update_model("a", "notes", patch).await.unwrap();
        assert_eq!(updated.name, "Jottings");
        assert_eq!(updated.fields.len(), 3);

        let record = service.find_record("a", "notes", id).await.unwrap().unwrap();
        assert_eq!(record.get("a"), Some("1"));
        assert_eq!(record.get("b"), Some("2"));
        assert_eq!(record.get("c"), None);

        service
            .update_record("a", "notes", id, &data(json!({ "c": "3" })))
            .await
            .unwrap();
        let record = service.find_record("a", "notes", id).await.unwrap().unwrap();
        assert_eq!(record.get("c"), Some("3"));

        let stored = service.find_model("a", "notes").await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let (service, _dir) = setup_service().await;
        create_posts(&service, "a").await;
        service
            .create_model(
                "b",
                definition(json!({
                    "slug": "posts",
                    "name": "Posts",
                    "kind": "collection",
                    "fields": [{ "name": "headline", "type": "text" }]
                })),
            )
            .await
            .unwrap();

        service
            .create_record("a", "posts", &data(json!({ "title": "from a" })))
            .await
            .unwrap();
        service
            .create_record("b", "posts", &data(json!({ "headline": "from b" })))
            .await
            .unwrap();

        let a = service.list_records("a", "posts").await.unwrap();
        let b = service.list_records("b", "posts").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(a[0].get("title"), Some("from a"));
        assert!(!a[0].has_attribute("headline"));
        assert_eq!(b[0].get("headline"), Some("from b"));
    }

    #[tokio::test]
    async fn test_delete_model_then_reads_are_not_found() {
        let (service, _dir) = setup_service().await;
        create_posts(&service, "a").await;
        let id = service
            .create_record("a", "posts", &data(json!({ "title": "x" })))
            .await
            .unwrap();

        service.delete_record("a", "posts", id).await.unwrap();
        assert!(service.find_record("a", "posts", id).await.unwrap().is_none());

        service.delete_model("a", "posts").await.unwrap();
        assert!(matches!(
            service.read_content("a", "posts").await,
            Err(CoreError::NotFound(_))
        ));
        // The slug can be reused afterwards.
        create_posts(&service, "a").await;
    }

    #[tokio::test]
    async fn test_reads_and_writes_racing_delete_model_are_not_found() {
        let (service, _dir) = setup_service().await;

        for _ in 0..30 {
            create_posts(&service, "a").await;

            let mut tasks = Vec::new();
            for n in 0..8 {
                let service = service.clone();
                tasks.push(tokio::spawn(async move {
                    if n % 2 == 0 {
                        service.list_records("a", "posts").await.map(|_| ())
                    } else {
                        service
                            .create_record("a", "posts", &data(json!({ "title": "race" })))
                            .await
                            .map(|_| ())
                    }
                }));
            }
            service.delete_model("a", "posts").await.unwrap();

            for task in tasks {
                match task.await.unwrap() {
                    Ok(()) | Err(CoreError::NotFound(_)) => {}
                    Err(e) => panic!("Operation racing delete_model failed with {:?}", e),
                }
            }
        }
    }
}
