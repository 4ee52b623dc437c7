use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::AppState;
use crate::application::ApplicationError;

/// Extracts the session token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware that resolves the bearer token to a session principal.
///
/// On success the `Principal` is inserted into the request extensions; handlers then
/// check it against the resource with `authz::authorize`.
pub async fn session_auth(
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApplicationError> {
    let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
        warn!("Missing or malformed Authorization header");
        return Err(ApplicationError::Unauthorized(
            "Authentication required".into(),
        ));
    };

    match app_state.auth.authenticate(&token).await? {
        Some(principal) => {
            debug!("Session authenticated for {}", principal.encode());
            req.extensions_mut().insert(principal);
            Ok(next.run(req).await)
        }
        None => {
            warn!("Unknown session token presented");
            Err(ApplicationError::Unauthorized(
                "Invalid session token".into(),
            ))
        }
    }
}
