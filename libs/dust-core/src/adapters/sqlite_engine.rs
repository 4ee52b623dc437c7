use super::namespaces::{TenantNamespace, TenantNamespaces};
use super::storage_fault;
use crate::domain::content_model::{ContentModel, ModelSlug};
use crate::domain::record::{ContentRecord, RecordPayload, SINGLETON_ID};
use crate::{CoreError, CoreResult, StorageEngine};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// `PRAGMA table_info` row: cid, name, type, notnull, dflt_value, pk.
type ColumnInfo = (i64, String, String, i64, Option<String>, i64);

/// Record storage with one physical table per content model, inside the tenant's namespace.
///
/// Every attribute is stored as text. Collection tables carry `NOT NULL` on required
/// columns; singleton tables keep every column nullable so partial upserts stay possible.
#[derive(Debug, Clone)]
pub struct SqliteStorageEngine {
    namespaces: Arc<TenantNamespaces>,
}

impl SqliteStorageEngine {
    pub fn new(namespaces: Arc<TenantNamespaces>) -> Self {
        Self { namespaces }
    }
}

// Identifiers reaching here come from `ModelSlug`/`FieldName` and never contain quotes.
fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn id_column(model: &ContentModel) -> String {
    if model.is_singleton() {
        format!("id INTEGER PRIMARY KEY CHECK (id = {SINGLETON_ID})")
    } else {
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()
    }
}

fn column_definitions(model: &ContentModel) -> Vec<String> {
    let mut columns = vec![id_column(model)];
    for field in &model.fields {
        columns.push(column_definition(model, field.name.as_str()));
    }
    columns
}

fn column_definition(model: &ContentModel, name: &str) -> String {
    let not_null = !model.is_singleton() && model.field(name).is_some_and(|f| f.required);
    if not_null {
        format!("{} TEXT NOT NULL", quote(name))
    } else {
        format!("{} TEXT", quote(name))
    }
}

fn projection(model: &ContentModel) -> String {
    std::iter::once("id".to_string())
        .chain(model.fields.iter().map(|f| quote(f.name.as_str())))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_record(model: &ContentModel, row: &SqliteRow) -> CoreResult<ContentRecord> {
    let context = || format!("decoding record of model '{}'", model.slug);
    let id: i64 = row.try_get(0).map_err(storage_fault(context()))?;
    let mut values = Vec::with_capacity(model.fields.len());
    for (index, field) in model.fields.iter().enumerate() {
        let value: Option<String> = row.try_get(index + 1).map_err(storage_fault(context()))?;
        values.push((field.name.to_string(), value));
    }
    Ok(ContentRecord { id, values })
}

fn ensure_kind(model: &ContentModel, singleton: bool, operation: &str) -> CoreResult<()> {
    if model.is_singleton() == singleton {
        return Ok(());
    }
    let kind = model.kind.as_str();
    Err(CoreError::InvalidOperation(format!(
        "Cannot {operation} on {kind} model '{}'",
        model.slug
    )))
}

fn ensure_known_keys(model: &ContentModel, payload: &RecordPayload) -> CoreResult<()> {
    for (name, _) in payload.iter() {
        if model.field(name.as_str()).is_none() {
            return Err(CoreError::Validation(format!(
                "Unknown field '{}' for model '{}'",
                name, model.slug
            )));
        }
    }
    Ok(())
}

/// Error mapping for record statements.
///
/// A model deleted between its metadata lookup and the statement leaves no table behind;
/// that is a missing model, not an unhealthy namespace.
fn record_fault(
    model: &ContentModel,
    context: impl Into<String>,
) -> impl FnOnce(sqlx::Error) -> CoreError {
    let slug = model.slug.clone();
    let context = context.into();
    move |e| {
        let missing_table = matches!(
            &e,
            sqlx::Error::Database(db) if db.message().starts_with("no such table")
        );
        if missing_table {
            debug!("Model {} was dropped during a record operation", slug);
            return CoreError::NotFound(format!("Model '{}' not found", slug));
        }
        CoreError::storage(context, e)
    }
}

async fn table_columns(conn: &mut SqliteConnection, table: &str) -> CoreResult<Vec<ColumnInfo>> {
    sqlx::query_as(&format!("PRAGMA table_info({})", quote(table)))
        .fetch_all(conn)
        .await
        .map_err(storage_fault(format!("inspecting table '{table}'")))
}

/// Recreates `model`'s table so only currently required fields keep `NOT NULL`.
///
/// Columns are carried over in their existing order, including ones whose field was
/// removed. The autoincrement high-water mark survives, so ids are never reused.
async fn rebuild_table(
    conn: &mut SqliteConnection,
    model: &ContentModel,
    columns: &[ColumnInfo],
) -> CoreResult<()> {
    let table = model.slug.table_name();
    let staging = format!("reconcile_{table}");
    let fault = || storage_fault(format!("rebuilding table '{table}'"));

    let carried: Vec<&str> = columns
        .iter()
        .filter(|(_, _, _, _, _, pk)| *pk == 0)
        .map(|(_, name, _, _, _, _)| name.as_str())
        .collect();

    let mut definitions = vec![id_column(model)];
    definitions.extend(carried.iter().map(|name| column_definition(model, name)));

    let column_list = std::iter::once("id".to_string())
        .chain(carried.iter().map(|name| quote(name)))
        .collect::<Vec<_>>()
        .join(", ");

    let sequence: Option<i64> = sqlx::query_scalar("SELECT seq FROM sqlite_sequence WHERE name = ?")
        .bind(&table)
        .fetch_optional(&mut *conn)
        .await
        .map_err(fault())?;

    let statements = [
        format!("DROP TABLE IF EXISTS {}", quote(&staging)),
        format!("CREATE TABLE {} ({})", quote(&staging), definitions.join(", ")),
        format!(
            "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
            quote(&staging),
            quote(&table)
        ),
        format!("DROP TABLE {}", quote(&table)),
        format!("ALTER TABLE {} RENAME TO {}", quote(&staging), quote(&table)),
    ];
    for statement in &statements {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(fault())?;
    }

    if let Some(seq) = sequence {
        let updated = sqlx::query("UPDATE sqlite_sequence SET seq = MAX(seq, ?) WHERE name = ?")
            .bind(seq)
            .bind(&table)
            .execute(&mut *conn)
            .await
            .map_err(fault())?;
        if updated.rows_affected() == 0 {
            sqlx::query("INSERT INTO sqlite_sequence (name, seq) VALUES (?, ?)")
                .bind(&table)
                .bind(seq)
                .execute(&mut *conn)
                .await
                .map_err(fault())?;
        }
    }

    info!("Rebuilt table {} to relax column constraints", table);
    Ok(())
}

impl SqliteStorageEngine {
    async fn namespace(&self, tenant: &str) -> CoreResult<Arc<TenantNamespace>> {
        self.namespaces.handle(tenant).await
    }

    async fn fetch_by_id(
        &self,
        tenant: &str,
        model: &ContentModel,
        id: i64,
    ) -> CoreResult<Option<ContentRecord>> {
        let ns = self.namespace(tenant).await?;
        let _read = ns.read().await;

        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            projection(model),
            quote(&model.slug.table_name())
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(ns.pool())
            .await
            .map_err(record_fault(model, format!(
                "loading record {id} of model '{}'",
                model.slug
            )))?;

        row.map(|row| decode_record(model, &row)).transpose()
    }
}

#[async_trait]
impl StorageEngine for SqliteStorageEngine {
    async fn provision(&self, tenant: &str, model: &ContentModel) -> CoreResult<()> {
        let ns = self.namespace(tenant).await?;
        let _write = ns.write().await;
        let table = model.slug.table_name();

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&table)
                .fetch_optional(ns.pool())
                .await
                .map_err(storage_fault(format!("checking table '{table}'")))?;
        if exists.is_some() {
            return Err(CoreError::Conflict(format!(
                "Model with slug '{}' already exists",
                model.slug
            )));
        }

        let sql = format!(
            "CREATE TABLE {} ({})",
            quote(&table),
            column_definitions(model).join(", ")
        );
        sqlx::query(&sql)
            .execute(ns.pool())
            .await
            .map_err(storage_fault(format!("creating table '{table}'")))?;

        debug!("Provisioned table {} for tenant {}", table, tenant);
        Ok(())
    }

    async fn reconcile(&self, tenant: &str, model: &ContentModel) -> CoreResult<()> {
        let ns = self.namespace(tenant).await?;
        let _write = ns.write().await;
        let table = model.slug.table_name();

        let mut tx = ns
            .pool()
            .begin()
            .await
            .map_err(storage_fault(format!("reconciling table '{table}'")))?;

        let columns = table_columns(&mut *tx, &table).await?;
        if columns.is_empty() {
            return Err(CoreError::storage(
                format!("reconciling model '{}'", model.slug),
                format!("table '{table}' is missing"),
            ));
        }

        let needs_rebuild = columns.iter().any(|(_, name, _, notnull, _, pk)| {
            *pk == 0
                && *notnull != 0
                && !model
                    .field(name)
                    .is_some_and(|f| f.required && !model.is_singleton())
        });
        if needs_rebuild {
            rebuild_table(&mut *tx, model, &columns).await?;
        }

        let existing: HashSet<&str> = columns
            .iter()
            .map(|(_, name, _, _, _, _)| name.as_str())
            .collect();
        for field in &model.fields {
            if existing.contains(field.name.as_str()) {
                continue;
            }
            // Added columns are always nullable: existing rows have no value for them.
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT",
                quote(&table),
                quote(field.name.as_str())
            );
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(storage_fault(format!(
                    "adding column '{}' to '{table}'",
                    field.name
                )))?;
            debug!("Added column {} to {}", field.name, table);
        }

        tx.commit()
            .await
            .map_err(storage_fault(format!("committing reconcile of '{table}'")))?;
        Ok(())
    }

    async fn drop_structure(&self, tenant: &str, model_slug: &ModelSlug) -> CoreResult<()> {
        let ns = self.namespace(tenant).await?;
        let _write = ns.write().await;
        let table = model_slug.table_name();

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote(&table)))
            .execute(ns.pool())
            .await
            .map_err(storage_fault(format!("dropping table '{table}'")))?;
        debug!("Dropped table {} for tenant {}", table, tenant);
        Ok(())
    }

    async fn list_records(
        &self,
        tenant: &str,
        model: &ContentModel,
    ) -> CoreResult<Vec<ContentRecord>> {
        let ns = self.namespace(tenant).await?;
        let _read = ns.read().await;

        let sql = format!(
            "SELECT {} FROM {} ORDER BY id ASC",
            projection(model),
            quote(&model.slug.table_name())
        );
        let rows = sqlx::query(&sql)
            .fetch_all(ns.pool())
            .await
            .map_err(record_fault(model, format!(
                "listing records of model '{}'",
                model.slug
            )))?;

        rows.iter().map(|row| decode_record(model, row)).collect()
    }

    async fn get_record(
        &self,
        tenant: &str,
        model: &ContentModel,
        id: i64,
    ) -> CoreResult<Option<ContentRecord>> {
        self.fetch_by_id(tenant, model, id).await
    }

    async fn get_singleton(
        &self,
        tenant: &str,
        model: &ContentModel,
    ) -> CoreResult<Option<ContentRecord>> {
        ensure_kind(model, true, "read the singleton")?;
        self.fetch_by_id(tenant, model, SINGLETON_ID).await
    }

    async fn create_record(
        &self,
        tenant: &str,
        model: &ContentModel,
        payload: &RecordPayload,
    ) -> CoreResult<i64> {
        ensure_kind(model, false, "create a record")?;
        ensure_known_keys(model, payload)?;
        let ns = self.namespace(tenant).await?;
        let _write = ns.write().await;
        let table = quote(&model.slug.table_name());

        let sql = if payload.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            let columns: Vec<String> = payload.iter().map(|(n, _)| quote(n.as_str())).collect();
            let placeholders = vec!["?"; payload.len()].join(", ");
            format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            )
        };

        let mut query = sqlx::query(&sql);
        for (_, value) in payload.iter() {
            query = query.bind(value.as_deref());
        }
        let result = query.execute(ns.pool()).await.map_err(record_fault(model, format!(
            "creating record in model '{}'",
            model.slug
        )))?;

        Ok(result.last_insert_rowid())
    }

    async fn update_record(
        &self,
        tenant: &str,
        model: &ContentModel,
        id: i64,
        payload: &RecordPayload,
    ) -> CoreResult<()> {
        ensure_kind(model, false, "update a record by id")?;
        ensure_known_keys(model, payload)?;
        let ns = self.namespace(tenant).await?;
        let _write = ns.write().await;
        let table = quote(&model.slug.table_name());

        let affected = if payload.is_empty() {
            sqlx::query_scalar::<_, i64>(&format!("SELECT id FROM {table} WHERE id = ?"))
                .bind(id)
                .fetch_optional(ns.pool())
                .await
                .map_err(record_fault(model, format!(
                    "loading record {id} of model '{}'",
                    model.slug
                )))?
                .map_or(0, |_| 1)
        } else {
            let assignments: Vec<String> = payload
                .iter()
                .map(|(n, _)| format!("{} = ?", quote(n.as_str())))
                .collect();
            let sql = format!("UPDATE {table} SET {} WHERE id = ?", assignments.join(", "));

            let mut query = sqlx::query(&sql);
            for (_, value) in payload.iter() {
                query = query.bind(value.as_deref());
            }
            query
                .bind(id)
                .execute(ns.pool())
                .await
                .map_err(record_fault(model, format!(
                    "updating record {id} of model '{}'",
                    model.slug
                )))?
                .rows_affected()
        };

        if affected == 0 {
            return Err(CoreError::NotFound(format!(
                "Record {} not found in model '{}'",
                id, model.slug
            )));
        }
        Ok(())
    }

    async fn upsert_singleton(
        &self,
        tenant: &str,
        model: &ContentModel,
        payload: &RecordPayload,
    ) -> CoreResult<()> {
        ensure_kind(model, true, "upsert the singleton")?;
        ensure_known_keys(model, payload)?;
        let ns = self.namespace(tenant).await?;
        let _write = ns.write().await;
        let table = quote(&model.slug.table_name());

        // One statement, so two first writers can never both insert.
        let sql = if payload.is_empty() {
            format!("INSERT INTO {table} (id) VALUES ({SINGLETON_ID}) ON CONFLICT(id) DO NOTHING")
        } else {
            let columns: Vec<String> = payload.iter().map(|(n, _)| quote(n.as_str())).collect();
            let placeholders = vec!["?"; payload.len()].join(", ");
            let assignments: Vec<String> = columns
                .iter()
                .map(|c| format!("{c} = excluded.{c}"))
                .collect();
            format!(
                "INSERT INTO {table} (id, {}) VALUES ({SINGLETON_ID}, {placeholders}) \
                 ON CONFLICT(id) DO UPDATE SET {}",
                columns.join(", "),
                assignments.join(", ")
            )
        };

        let mut query = sqlx::query(&sql);
        for (_, value) in payload.iter() {
            query = query.bind(value.as_deref());
        }
        query.execute(ns.pool()).await.map_err(record_fault(model, format!(
            "upserting singleton '{}'",
            model.slug
        )))?;
        Ok(())
    }

    async fn delete_record(&self, tenant: &str, model: &ContentModel, id: i64) -> CoreResult<()> {
        ensure_kind(model, false, "delete a record")?;
        let ns = self.namespace(tenant).await?;
        let _write = ns.write().await;

        let sql = format!("DELETE FROM {} WHERE id = ?", quote(&model.slug.table_name()));
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(ns.pool())
            .await
            .map_err(record_fault(model, format!(
                "deleting record {id} of model '{}'",
                model.slug
            )))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "Record {} not found in model '{}'",
                id, model.slug
            )));
        }
        Ok(())
    }
}
