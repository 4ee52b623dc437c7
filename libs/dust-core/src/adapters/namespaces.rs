use crate::{CoreError, CoreResult};
use dashmap::DashMap;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

const CONTENT_DB_FILE: &str = "content.db";
const IMAGES_DIR: &str = "images";
const MAX_CONNECTIONS_PER_TENANT: u32 = 4;

/// Open handle on one tenant's isolated storage namespace.
///
/// Writers (structural changes and record writes) hold `write()`, readers `read()`.
/// The lock is per tenant, so a slow namespace never blocks another tenant.
#[derive(Debug)]
pub struct TenantNamespace {
    slug: String,
    root: PathBuf,
    pool: SqlitePool,
    lock: RwLock<()>,
}

impl TenantNamespace {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().await
    }
}

/// Lazily opened namespace handles keyed by tenant slug.
///
/// A handle stays open for the process lifetime and is only evicted when its tenant is
/// deleted; after eviction the next `handle` call re-opens the same directory if it exists.
#[derive(Debug)]
pub struct TenantNamespaces {
    tenants_dir: PathBuf,
    handles: DashMap<String, Arc<TenantNamespace>>,
    // Serializes opening so two requests never race to open the same namespace.
    open_lock: Mutex<()>,
}

impl TenantNamespaces {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            tenants_dir: data_dir.as_ref().join("tenants"),
            handles: DashMap::new(),
            open_lock: Mutex::new(()),
        }
    }

    pub fn namespace_dir(&self, slug: &str) -> PathBuf {
        self.tenants_dir.join(slug)
    }

    /// Returns the open handle for an existing namespace, `NotFound` if it was never provisioned.
    pub async fn handle(&self, slug: &str) -> CoreResult<Arc<TenantNamespace>> {
        if let Some(handle) = self.handles.get(slug) {
            return Ok(handle.clone());
        }

        let _guard = self.open_lock.lock().await;
        if let Some(handle) = self.handles.get(slug) {
            return Ok(handle.clone());
        }

        let root = self.namespace_dir(slug);
        if !tokio::fs::try_exists(&root)
            .await
            .map_err(|e| CoreError::storage(format!("checking namespace for tenant '{slug}'"), e))?
        {
            return Err(CoreError::NotFound(format!("Tenant '{}' not found", slug)));
        }

        let handle = Arc::new(open_namespace(slug, root).await?);
        self.handles.insert(slug.to_string(), handle.clone());
        debug!("Opened storage namespace for tenant {}", slug);
        Ok(handle)
    }

    /// Creates the namespace directory tree and its schema store.
    ///
    /// A directory left behind by an earlier tenant of the same slug is wiped first: only
    /// the registry row gives a namespace an owner.
    pub async fn provision(&self, slug: &str) -> CoreResult<()> {
        let _guard = self.open_lock.lock().await;
        if let Some((_, stale)) = self.handles.remove(slug) {
            stale.pool.close().await;
        }

        let root = self.namespace_dir(slug);
        if tokio::fs::try_exists(&root).await.unwrap_or(false) {
            warn!(
                "Removing orphaned namespace directory for tenant {} before provisioning",
                slug
            );
            tokio::fs::remove_dir_all(&root).await.map_err(|e| {
                CoreError::storage(format!("clearing orphaned namespace for tenant '{slug}'"), e)
            })?;
        }

        tokio::fs::create_dir_all(root.join(IMAGES_DIR))
            .await
            .map_err(|e| CoreError::storage(format!("creating namespace for tenant '{slug}'"), e))?;

        match open_namespace(slug, root.clone()).await {
            Ok(handle) => {
                self.handles.insert(slug.to_string(), Arc::new(handle));
                info!("Provisioned storage namespace for tenant {}", slug);
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&root).await;
                Err(e)
            }
        }
    }

    /// Evicts the handle (waiting for in-flight writers) and deletes the namespace tree.
    pub async fn remove(&self, slug: &str) -> CoreResult<()> {
        let _guard = self.open_lock.lock().await;
        if let Some((_, handle)) = self.handles.remove(slug) {
            let _write = handle.write().await;
            handle.pool.close().await;
        }

        let root = self.namespace_dir(slug);
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {
                info!("Removed storage namespace for tenant {}", slug);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::storage(
                format!("removing namespace for tenant '{slug}'"),
                e,
            )),
        }
    }

    pub fn is_open(&self, slug: &str) -> bool {
        self.handles.contains_key(slug)
    }
}

async fn open_namespace(slug: &str, root: PathBuf) -> CoreResult<TenantNamespace> {
    let options = SqliteConnectOptions::new()
        .filename(root.join(CONTENT_DB_FILE))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS_PER_TENANT)
        .connect_with(options)
        .await
        .map_err(|e| CoreError::storage(format!("opening namespace for tenant '{slug}'"), e))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_models (
            slug TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('collection', 'singleton')),
            fields TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await
    .map_err(|e| CoreError::storage(format!("initializing schema store for tenant '{slug}'"), e))?;

    Ok(TenantNamespace {
        slug: slug.to_string(),
        root,
        pool,
        lock: RwLock::new(()),
    })
}
