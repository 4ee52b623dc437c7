// Declare modules within the adapters directory
pub mod namespaces;
pub mod sqlite_engine;
pub mod sqlite_schema;
pub mod sqlite_system;

pub use namespaces::{TenantNamespace, TenantNamespaces};
pub use sqlite_engine::SqliteStorageEngine;
pub use sqlite_schema::SqliteSchemaStore;
pub use sqlite_system::SqliteSystemStore;

use crate::{BoxError, CoreError};

/// Wraps an underlying storage error as a `StorageFault` carrying `context`.
pub(crate) fn storage_fault<E: Into<BoxError>>(
    context: impl Into<String>,
) -> impl FnOnce(E) -> CoreError {
    let context = context.into();
    move |e| CoreError::storage(context, e)
}
