use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use dust_core::domain::content_model::ModelDefinition;
use dust_core::domain::session::Principal;
use dust_core::services::ModelPatch;
use serde_json::json;

use crate::AppState;
use crate::application::ApiResult;
use crate::application::authz::require_managed_tenant;

// POST /api/admin/tenants/{slug}/models
pub async fn handle_create_model(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
    Json(definition): Json<ModelDefinition>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let model = app_state.content.create_model(&slug, definition).await?;
    Ok((StatusCode::CREATED, Json(json!({ "model": model }))))
}

// PATCH /api/admin/tenants/{slug}/models/{model}
pub async fn handle_update_model(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug)): Path<(String, String)>,
    Json(patch): Json<ModelPatch>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    let model = app_state
        .content
        .update_model(&slug, &model_slug, patch)
        .await?;
    Ok(Json(json!({ "model": model })))
}

// DELETE /api/admin/tenants/{slug}/models/{model}
pub async fn handle_delete_model(
    State(app_state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((slug, model_slug)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    require_managed_tenant(&app_state, &principal, &slug).await?;

    app_state.content.delete_model(&slug, &model_slug).await?;
    Ok(Json(json!({ "success": true })))
}
