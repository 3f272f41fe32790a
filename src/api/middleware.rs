use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::error::AppError;
use crate::policy::Principal;

/// Resolves the bearer access token into a [`Principal`] stored in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::TokenNotFound)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::TokenNotFound)?;

    let claims = state.services.tokens.validate_access(token).map_err(|e| {
        tracing::debug!("rejected access token: {}", e);
        AppError::from(e)
    })?;

    request.extensions_mut().insert(Principal {
        user_id: claims.user_id,
        role: claims.role,
        email_verified: claims.email_verified,
    });

    Ok(next.run(request).await)
}
