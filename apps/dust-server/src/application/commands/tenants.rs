use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use dust_core::domain::session::Principal;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::application::ApiResult;
use crate::application::authz::{Requirement, authorize};

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub slug: String,
    pub name: String,
    pub password: String,
}

/// Any `slug` in the body is ignored: the path names the tenant and it never changes.
#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// POST /api/admin/tenants
pub async fn handle_create_tenant(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&principal, Requirement::SuperAdminOnly)?;

    let tenant = app_state
        .tenants
        .create_tenant(&payload.slug, &payload.name, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "tenant": tenant }))))
}

// PATCH /api/admin/tenants/{slug}
pub async fn handle_update_tenant(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&principal, Requirement::SuperAdminOnly)?;

    let tenant = app_state
        .tenants
        .update_tenant(&slug, payload.name.as_deref(), payload.password.as_deref())
        .await?;
    Ok(Json(json!({ "tenant": tenant })))
}

// DELETE /api/admin/tenants/{slug}
pub async fn handle_delete_tenant(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authorize(&principal, Requirement::SuperAdminOnly)?;

    app_state.tenants.delete_tenant(&slug).await?;
    Ok(Json(json!({ "success": true })))
}
