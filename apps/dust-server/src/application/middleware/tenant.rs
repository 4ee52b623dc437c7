use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::application::ApplicationError;

fn request_host(req: &Request) -> String {
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or_default()
        .to_string()
}

/// Attaches the `TenantContext` for the request's host to every request.
pub async fn resolve_tenant_context(
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApplicationError> {
    let host = request_host(&req);
    let context = app_state.resolver.resolve(&host).await?;
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}
