//! Service access token endpoints under `/api/v1/service-access-tokens`.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use time::Duration;
use uuid::Uuid;

use crate::middleware::{AuthState, Authenticated};
use crate::pagination::{Page, PageRequest};
use crate::types::{CreatedServiceToken, ServiceAccessToken};
use crate::{AuthError, AuthResult};

/// Body of a create request.
#[derive(Debug, Deserialize)]
pub struct CreateServiceTokenRequest {
    pub name: String,
    /// Lifetime in seconds; the configured default when absent.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Query of a revoke request.
#[derive(Debug, Deserialize)]
pub struct RevokeServiceTokenParams {
    pub token_id: Uuid,
}

/// `POST /api/v1/service-access-tokens`
pub async fn create_service_token(
    State(state): State<AuthState>,
    Authenticated(user): Authenticated,
    Json(request): Json<CreateServiceTokenRequest>,
) -> AuthResult<(StatusCode, Json<CreatedServiceToken>)> {
    let ttl = request
        .expires_in
        .map(|secs| {
            i64::try_from(secs)
                .map(Duration::seconds)
                .map_err(|_| AuthError::invalid_request("expires_in is too large"))
        })
        .transpose()?;

    let created = state
        .service_tokens
        .create(user.user_id, &request.name, ttl)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/v1/service-access-tokens?page=&page_size=`
pub async fn list_service_tokens(
    State(state): State<AuthState>,
    Authenticated(user): Authenticated,
    Query(page): Query<PageRequest>,
) -> AuthResult<Json<Page<ServiceAccessToken>>> {
    let page = state.service_tokens.list(user.user_id, page).await?;
    Ok(Json(page))
}

/// `DELETE /api/v1/service-access-tokens?token_id=`
pub async fn revoke_service_token(
    State(state): State<AuthState>,
    Authenticated(user): Authenticated,
    Query(params): Query<RevokeServiceTokenParams>,
) -> AuthResult<StatusCode> {
    state
        .service_tokens
        .revoke(user.user_id, params.token_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
