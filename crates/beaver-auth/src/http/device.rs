//! Device authorization endpoints.
//!
//! - `POST /auth/device` starts a handshake
//! - `POST /auth/device/poll` advances it

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::AuthResult;
use crate::device::{DeviceAuthorization, PollResult};
use crate::middleware::AuthState;

/// Body of a poll request.
#[derive(Debug, Deserialize)]
pub struct PollRequest {
    /// Continuation token returned by the start call.
    pub token: String,
}

/// `POST /auth/device`
pub async fn start_device_flow(
    State(state): State<AuthState>,
) -> AuthResult<Json<DeviceAuthorization>> {
    let authorization = state.device_flow.start().await?;
    Ok(Json(authorization))
}

/// `POST /auth/device/poll`
///
/// `pending` and `expired` are successful responses; only an unusable
/// continuation or an upstream failure is an error.
pub async fn poll_device_flow(
    State(state): State<AuthState>,
    Json(request): Json<PollRequest>,
) -> AuthResult<Json<PollResult>> {
    let result = state.device_flow.poll(&request.token).await?;
    Ok(Json(result))
}
