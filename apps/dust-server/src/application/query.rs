use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use dust_core::domain::session::Principal;
use dust_core::resolver::TenantContext;
use dust_core::services::ContentView;
use serde_json::json;
use tracing::debug;

use crate::AppState;
use super::authz::{Requirement, authorize, require_managed_tenant};
use super::{ApiResult, ApplicationError};

// --- Tenants (super admin) ---

// GET /api/admin/tenants
pub async fn handle_list_tenants(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    authorize(&principal, Requirement::SuperAdminOnly)?;

    let tenants = app_state.tenants.list_tenants().await?;
    Ok(Json(json!({ "tenants": tenants })))
}

// GET /api/admin/tenants/{slug}
pub async fn handle_get_tenant(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authorize(&principal, Requirement::SuperAdminOnly)?;

    let tenant = app_state
        .tenants
        .find_tenant(&slug)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("Tenant '{}' not found", slug)))?;
    Ok(Json(json!({ "tenant": tenant })))
}

// --- Models ---

// GET /api/admin/tenants/{slug}/models
pub async fn handle_list_models(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let models = app_state.content.list_models(&slug).await?;
    Ok(Json(json!({ "models": models })))
}

// GET /api/admin/tenants/{slug}/models/{model}
pub async fn handle_get_model(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let model = app_state
        .content
        .find_model(&slug, &model_slug)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("Model '{}' not found", model_slug)))?;
    Ok(Json(json!({ "model": model })))
}

// --- Content (admin) ---

// GET /api/admin/tenants/{slug}/content/{model}
pub async fn handle_list_content(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let response = match app_state.content.read_content(&slug, &model_slug).await? {
        ContentView::Collection(items) => json!({ "items": items }),
        ContentView::Singleton(item) => json!({ "item": item }),
    };
    Ok(Json(response))
}

// GET /api/admin/tenants/{slug}/content/{model}/singleton
pub async fn handle_get_singleton(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let item = app_state.content.find_singleton(&slug, &model_slug).await?;
    Ok(Json(json!({ "item": item })))
}

// GET /api/admin/tenants/{slug}/content/{model}/{id}
pub async fn handle_get_record(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug, id)): Path<(String, String, i64)>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let item = app_state
        .content
        .find_record(&slug, &model_slug, id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("Record {} not found", id)))?;
    Ok(Json(json!({ "item": item })))
}

// --- Public read API (tenant from host, no session) ---

fn public_tenant(context: &TenantContext) -> ApiResult<&str> {
    match context {
        TenantContext::Resolved(tenant) => Ok(&tenant.slug),
        TenantContext::Unknown { label } => {
            debug!("Public request for unknown tenant {}", label);
            Err(ApplicationError::NotFound("Tenant not found".into()))
        }
        TenantContext::NoTenant => Err(ApplicationError::NotFound("Tenant not found".into())),
    }
}

// GET /api/content/{model}
pub async fn handle_public_content(
    State(app_state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path(model_slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let slug = public_tenant(&context)?;

    let view = app_state.content.read_content(slug, &model_slug).await?;
    Ok(Json(json!({ "data": view })))
}

// GET /api/content/{model}/{id}
pub async fn handle_public_record(
    State(app_state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Path((model_slug, id)): Path<(String, i64)>,
) -> ApiResult<impl IntoResponse> {
    let slug = public_tenant(&context)?;

    let item = app_state
        .content
        .find_record(slug, &model_slug, id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(format!("Record {} not found", id)))?;
    Ok(Json(json!({ "data": item })))
}
