//! Session endpoints: refresh, logout and current user.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{AuthState, Authenticated};
use crate::types::{Identity, TokenPair};
use crate::{AuthError, AuthResult};

/// Body of a refresh request.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub user_id: Uuid,
    pub refresh_token: String,
}

/// Body of a logout request.
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// `POST /auth/refresh`
pub async fn refresh_session(
    State(state): State<AuthState>,
    Json(request): Json<RefreshRequest>,
) -> AuthResult<Json<TokenPair>> {
    let pair = state
        .rotator
        .rotate(request.user_id, &request.refresh_token)
        .await?;
    Ok(Json(pair))
}

/// `POST /auth/logout`
///
/// Deletes the refresh record so the session can no longer be refreshed.
/// Access tokens already handed out stay valid until they expire.
pub async fn logout(
    State(state): State<AuthState>,
    Json(request): Json<LogoutRequest>,
) -> AuthResult<Json<LogoutResponse>> {
    state.rotator.revoke(&request.refresh_token).await?;
    Ok(Json(LogoutResponse {
        message: "logged out".to_string(),
    }))
}

/// `GET /auth/me`
pub async fn current_user(
    State(state): State<AuthState>,
    Authenticated(user): Authenticated,
) -> AuthResult<Json<Identity>> {
    let identity = state
        .identities
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| AuthError::not_found("user"))?;
    Ok(Json(identity))
}
