use super::namespaces::TenantNamespaces;
use super::storage_fault;
use crate::domain::session::{Principal, Session};
use crate::domain::tenant::{
    NewTenant, SuperAdmin, Tenant, TenantUpdate, validate_tenant_name, validate_tenant_slug,
};
use crate::{AdminStore, CoreError, CoreResult, SessionStore, TenantRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

const SYSTEM_DB_FILE: &str = "system.db";

#[derive(sqlx::FromRow, Debug)]
struct TenantRow {
    slug: String,
    name: String,
    password_hash: String,
    password_plaintext: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            slug: row.slug,
            name: row.name,
            password_hash: row.password_hash,
            password_plaintext: row.password_plaintext,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow, Debug)]
struct SessionRow {
    token: String,
    principal: String,
    created_at: DateTime<Utc>,
}

/// The process-wide store shared by every tenant: registry, sessions and the super admin.
///
/// Tenant creation and deletion also drive the namespace lifecycle, so the registry never
/// holds a row without a namespace.
#[derive(Debug, Clone)]
pub struct SqliteSystemStore {
    pool: SqlitePool,
    namespaces: Arc<TenantNamespaces>,
}

impl SqliteSystemStore {
    pub async fn open(data_dir: &Path, namespaces: Arc<TenantNamespaces>) -> CoreResult<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(storage_fault("creating data directory"))?;

        let options = SqliteConnectOptions::new()
            .filename(data_dir.join(SYSTEM_DB_FILE))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(storage_fault("opening system database"))?;

        let store = Self { pool, namespaces };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> CoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS super_admin (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                slug TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                password_plaintext TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                principal TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_fault("initializing system database"))?;
        }
        Ok(())
    }

    pub fn namespaces(&self) -> &Arc<TenantNamespaces> {
        &self.namespaces
    }
}

#[async_trait]
impl TenantRegistry for SqliteSystemStore {
    async fn list(&self) -> CoreResult<Vec<Tenant>> {
        let rows: Vec<TenantRow> = sqlx::query_as(
            r#"
            SELECT slug, name, password_hash, password_plaintext, created_at
            FROM tenants
            ORDER BY created_at DESC, slug ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_fault("listing tenants"))?;
        Ok(rows.into_iter().map(Tenant::from).collect())
    }

    async fn get(&self, slug: &str) -> CoreResult<Option<Tenant>> {
        let row: Option<TenantRow> = sqlx::query_as(
            r#"
            SELECT slug, name, password_hash, password_plaintext, created_at
            FROM tenants
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_fault(format!("loading tenant '{slug}'")))?;
        Ok(row.map(Tenant::from))
    }

    async fn create(&self, tenant: NewTenant) -> CoreResult<Tenant> {
        validate_tenant_slug(&tenant.slug)?;
        validate_tenant_name(&tenant.name)?;
        let created_at = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_fault("starting tenant creation"))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tenants (slug, name, password_hash, password_plaintext, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(&tenant.slug)
        .bind(&tenant.name)
        .bind(&tenant.password_hash)
        .bind(&tenant.password_plaintext)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_fault(format!("inserting tenant '{}'", tenant.slug)))?;

        if inserted.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Err(CoreError::Conflict(format!(
                "Tenant with slug '{}' already exists",
                tenant.slug
            )));
        }

        // The row stays uncommitted until the namespace exists.
        if let Err(e) = self.namespaces.provision(&tenant.slug).await {
            let _ = tx.rollback().await;
            error!("Provisioning namespace for tenant {} failed: {}", tenant.slug, e);
            return Err(CoreError::storage(
                format!(
                    "tenant '{}' namespace provisioning failed; registry row rolled back",
                    tenant.slug
                ),
                e,
            ));
        }

        if let Err(e) = tx.commit().await {
            if let Err(cleanup) = self.namespaces.remove(&tenant.slug).await {
                error!(
                    "Tenant {} registry commit failed and its namespace could not be removed: {}",
                    tenant.slug, cleanup
                );
            }
            return Err(CoreError::storage(
                format!("committing tenant '{}'", tenant.slug),
                e,
            ));
        }

        info!("Created tenant {}", tenant.slug);
        Ok(Tenant {
            slug: tenant.slug,
            name: tenant.name,
            password_hash: tenant.password_hash,
            password_plaintext: tenant.password_plaintext,
            created_at,
        })
    }

    async fn update(&self, slug: &str, update: TenantUpdate) -> CoreResult<Tenant> {
        if let Some(name) = &update.name {
            validate_tenant_name(name)?;
        }

        if !update.is_empty() {
            let result = sqlx::query(
                r#"
                UPDATE tenants
                SET name = COALESCE(?, name),
                    password_hash = COALESCE(?, password_hash),
                    password_plaintext = COALESCE(?, password_plaintext)
                WHERE slug = ?
                "#,
            )
            .bind(&update.name)
            .bind(&update.password_hash)
            .bind(&update.password_plaintext)
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(storage_fault(format!("updating tenant '{slug}'")))?;

            if result.rows_affected() == 0 {
                return Err(CoreError::NotFound(format!("Tenant '{}' not found", slug)));
            }
        }

        self.get(slug)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Tenant '{}' not found", slug)))
    }

    async fn delete(&self, slug: &str) -> CoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_fault("starting tenant deletion"))?;

        let deleted = sqlx::query("DELETE FROM tenants WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await
            .map_err(storage_fault(format!("deleting tenant '{slug}'")))?;

        if deleted.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Err(CoreError::NotFound(format!("Tenant '{}' not found", slug)));
        }

        sqlx::query("DELETE FROM sessions WHERE principal = ?")
            .bind(Principal::tenant(slug).encode())
            .execute(&mut *tx)
            .await
            .map_err(storage_fault(format!("revoking sessions of tenant '{slug}'")))?;

        if let Err(e) = self.namespaces.remove(slug).await {
            let _ = tx.rollback().await;
            error!("Namespace removal for tenant {} failed: {}", slug, e);
            return Err(CoreError::storage(
                format!("tenant '{slug}' namespace removal failed; registry row retained"),
                e,
            ));
        }

        if let Err(e) = tx.commit().await {
            error!(
                "Tenant {} namespace was removed but its registry row could not be deleted: {}",
                slug, e
            );
            return Err(CoreError::storage(
                format!("tenant '{slug}' namespace removed but registry row deletion failed"),
                e,
            ));
        }

        info!("Deleted tenant {}", slug);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSystemStore {
    async fn create_session(&self, principal: &Principal) -> CoreResult<String> {
        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO sessions (token, principal, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(principal.encode())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(storage_fault("creating session"))?;
        Ok(token)
    }

    async fn get_session(&self, token: &str) -> CoreResult<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT token, principal, created_at FROM sessions WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_fault("loading session"))?;

        Ok(row.and_then(|row| match Principal::decode(&row.principal) {
            Some(principal) => Some(Session {
                token: row.token,
                principal,
                created_at: row.created_at,
            }),
            None => {
                warn!("Ignoring session with unrecognised principal encoding");
                None
            }
        }))
    }

    async fn delete_session(&self, token: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(storage_fault("deleting session"))?;
        Ok(())
    }
}

#[async_trait]
impl AdminStore for SqliteSystemStore {
    async fn get_super_admin(&self) -> CoreResult<Option<SuperAdmin>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT username, password_hash FROM super_admin LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_fault("loading super admin"))?;
        Ok(row.map(|(username, password_hash)| SuperAdmin {
            username,
            password_hash,
        }))
    }

    async fn create_super_admin(&self, username: &str, password_hash: &str) -> CoreResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO super_admin (username, password_hash)
            SELECT ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM super_admin)
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(storage_fault("creating super admin"))?;

        if inserted.rows_affected() == 0 {
            return Err(CoreError::Conflict("Super admin already exists".into()));
        }
        Ok(())
    }
}
