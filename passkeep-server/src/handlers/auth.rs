//! Sign up / sign in handlers.

use crate::error::ServerError;
use crate::server::AppState;
use axum::extract::State;
use axum::Json;
use passkeep_core::sync::models::{CredentialsRequest, TokenResponse};

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ServerError> {
    let token = state.auth.sign_up(&req.login, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ServerError> {
    let token = state.auth.sign_in(&req.login, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}
