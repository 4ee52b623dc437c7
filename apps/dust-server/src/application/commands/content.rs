use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use dust_core::domain::session::Principal;
use serde_json::{Map, Value, json};

use crate::AppState;
use crate::application::ApiResult;
use crate::application::authz::require_managed_tenant;

// POST /api/admin/tenants/{slug}/content/{model}
pub async fn handle_create_record(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug)): Path<(String, String)>,
    Json(data): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let id = app_state
        .content
        .create_record(&slug, &model_slug, &data)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

// PUT /api/admin/tenants/{slug}/content/{model}
pub async fn handle_upsert_singleton(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug)): Path<(String, String)>,
    Json(data): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    app_state
        .content
        .upsert_singleton(&slug, &model_slug, &data)
        .await?;
    let item = app_state.content.find_singleton(&slug, &model_slug).await?;
    Ok(Json(json!({ "success": true, "item": item })))
}

// PATCH /api/admin/tenants/{slug}/content/{model}/{id}
pub async fn handle_update_record(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug, id)): Path<(String, String, i64)>,
    Json(data): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    app_state
        .content
        .update_record(&slug, &model_slug, id, &data)
        .await?;
    let item = app_state.content.find_record(&slug, &model_slug, id).await?;
    Ok(Json(json!({ "success": true, "item": item })))
}

// DELETE /api/admin/tenants/{slug}/content/{model}/{id}
pub async fn handle_delete_record(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug, id)): Path<(String, String, i64)>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    app_state
        .content
        .delete_record(&slug, &model_slug, id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
