//! Bearer token middleware for the record routes.

use super::AuthService;
use crate::error::ServerError;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use passkeep_core::sync::auth::parse_bearer;
use std::sync::Arc;

/// Resolve the bearer token to a [`super::User`] and put it in the request
/// extensions. Requests without a valid token never reach the handler.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer)
        .map(str::to_string)
        .ok_or_else(|| ServerError::Unauthenticated("missing bearer token".to_string()))?;

    let user = auth.authenticate_user(&token).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
