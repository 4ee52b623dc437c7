use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
use dust_core::{
    CoreError, CoreResult,
    adapters::{SqliteSchemaStore, SqliteStorageEngine, SqliteSystemStore, TenantNamespaces},
    resolver::TenantResolver,
    services::{AuthService, ContentService, TenantService},
};
use http::StatusCode;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod application;
pub mod config;

use application::{
    commands::{auth, content, models, tenants},
    middleware::{resolve_tenant_context, session_auth},
    query,
};
use config::Config;

// Holds shared dependencies
#[derive(Clone)]
pub struct AppState {
    pub tenants: TenantService,
    pub content: ContentService,
    pub auth: AuthService,
    pub resolver: TenantResolver,
}

impl AppState {
    /// Opens the system store under `config.data_dir` and wires every service to it.
    pub async fn open(config: &Config) -> CoreResult<Self> {
        let namespaces = Arc::new(TenantNamespaces::new(&config.data_dir));
        let system = Arc::new(SqliteSystemStore::open(&config.data_dir, namespaces.clone()).await?);
        let schemas = Arc::new(SqliteSchemaStore::new(namespaces.clone()));
        let engine = Arc::new(SqliteStorageEngine::new(namespaces));

        info!("Opened data directory {}", config.data_dir.display());
        Ok(Self {
            tenants: TenantService::new(system.clone()),
            content: ContentService::new(schemas, engine),
            auth: AuthService::new(system.clone(), system.clone(), system.clone()),
            resolver: TenantResolver::new(config.resolver.clone(), system),
        })
    }
}

// Function to create the main Axum router with state
pub fn create_app(app_state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/tenants",
            get(query::handle_list_tenants).post(tenants::handle_create_tenant),
        )
        .route(
            "/tenants/{slug}",
            get(query::handle_get_tenant)
                .patch(tenants::handle_update_tenant)
                .delete(tenants::handle_delete_tenant),
        )
        .route(
            "/tenants/{slug}/models",
            get(query::handle_list_models).post(models::handle_create_model),
        )
        .route(
            "/tenants/{slug}/models/{model}",
            get(query::handle_get_model)
                .patch(models::handle_update_model)
                .delete(models::handle_delete_model),
        )
        .route(
            "/tenants/{slug}/content/{model}",
            get(query::handle_list_content)
                .post(content::handle_create_record)
                .put(content::handle_upsert_singleton),
        )
        .route(
            "/tenants/{slug}/content/{model}/singleton",
            get(query::handle_get_singleton),
        )
        .route(
            "/tenants/{slug}/content/{model}/{id}",
            get(query::handle_get_record)
                .patch(content::handle_update_record)
                .delete(content::handle_delete_record),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            session_auth,
        ));

    let auth_routes = Router::new()
        .route("/setup-status", get(auth::handle_setup_status))
        .route("/setup", post(auth::handle_setup))
        .route("/login", post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .route("/check", get(auth::handle_check));

    let tenant_auth_routes = Router::new()
        .route("/login", post(auth::handle_tenant_login))
        .route("/logout", post(auth::handle_logout))
        .route("/check", get(auth::handle_tenant_check));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth_routes)
        .nest("/api/tenant/auth", tenant_auth_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/content/{model}", get(query::handle_public_content))
        .route("/api/content/{model}/{id}", get(query::handle_public_record))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            resolve_tenant_context,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Maps a core error class to its HTTP status. Storage faults are logged here, once.
pub fn map_core_error(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::StorageFault { .. } => {
            error!("Storage fault: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
