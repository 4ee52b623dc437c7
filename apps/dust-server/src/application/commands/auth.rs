use axum::{
    Extension, Json,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use dust_core::resolver::TenantContext;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::AppState;
use crate::application::middleware::bearer_token;
use crate::application::{ApiResult, ApplicationError};

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TenantLoginRequest {
    pub password: String,
}

fn host_tenant(context: &TenantContext) -> ApiResult<&str> {
    context
        .tenant()
        .map(|tenant| tenant.slug.as_str())
        .ok_or_else(|| ApplicationError::NotFound("Tenant not found".into()))
}

// GET /api/auth/setup-status
pub async fn handle_setup_status(State(app_state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let complete = app_state.auth.setup_status().await?;
    Ok(Json(json!({ "setupComplete": complete })))
}

// POST /api/auth/setup
pub async fn handle_setup(
    State(app_state): State<AppState>,
    Json(payload): Json<SetupRequest>,
) -> ApiResult<impl IntoResponse> {
    app_state
        .auth
        .setup(&payload.username, &payload.password)
        .await?;
    Ok(Json(json!({ "success": true })))
}

// POST /api/auth/login
pub async fn handle_login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let token = app_state
        .auth
        .login_super_admin(&payload.username, &payload.password)
        .await?
        .ok_or_else(|| ApplicationError::Unauthorized("Invalid credentials".into()))?;

    info!("Super admin {} logged in", payload.username);
    Ok(Json(json!({ "success": true, "token": token })))
}

// POST /api/auth/logout, /api/tenant/auth/logout
pub async fn handle_logout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = bearer_token(&headers) {
        app_state.auth.logout(token).await?;
    }
    Ok(Json(json!({ "success": true })))
}

// GET /api/auth/check
pub async fn handle_check(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let authenticated = match bearer_token(&headers) {
        Some(token) => app_state
            .auth
            .authenticate(token)
            .await?
            .is_some_and(|principal| principal.is_super_admin()),
        None => false,
    };
    Ok(Json(json!({ "authenticated": authenticated })))
}

// POST /api/tenant/auth/login
pub async fn handle_tenant_login(
    State(app_state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    Json(payload): Json<TenantLoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let slug = host_tenant(&context)?;
    let token = app_state
        .auth
        .login_tenant(slug, &payload.password)
        .await?
        .ok_or_else(|| ApplicationError::Unauthorized("Invalid password".into()))?;

    info!("Tenant {} logged in", slug);
    Ok(Json(json!({ "success": true, "token": token })))
}

// GET /api/tenant/auth/check
pub async fn handle_tenant_check(
    State(app_state): State<AppState>,
    Extension(context): Extension<TenantContext>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let slug = host_tenant(&context)?;
    let authenticated = match bearer_token(&headers) {
        Some(token) => app_state
            .auth
            .authenticate(token)
            .await?
            .is_some_and(|principal| principal.is_tenant(slug)),
        None => false,
    };
    Ok(Json(json!({ "authenticated": authenticated, "tenant": slug })))
}
