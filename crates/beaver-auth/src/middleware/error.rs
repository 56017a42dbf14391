//! HTTP rendering of [`AuthError`].
//!
//! Every error becomes `{"error": "<message>"}`. Credential failures share one
//! message so a caller cannot tell a forged token from an expired or revoked
//! one. Server-side details are logged, not returned.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

/// Message returned for every credential failure.
pub const CREDENTIAL_ERROR_MESSAGE: &str = "invalid or expired credential";

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, challenge, message) = error_details(&self);

        if status.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(challenge, &message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(json!({ "error": message }))).into_response()
    }
}

/// Returns (HTTP status, challenge error code, client-facing message).
fn error_details(error: &AuthError) -> (StatusCode, &'static str, String) {
    match error {
        AuthError::InvalidToken { .. } | AuthError::TokenExpired | AuthError::TokenRevoked => (
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            CREDENTIAL_ERROR_MESSAGE.to_string(),
        ),
        AuthError::Unauthorized { message } => {
            (StatusCode::UNAUTHORIZED, "invalid_request", message.clone())
        }
        AuthError::InvalidContinuation { .. } => (
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "invalid or expired device authorization".to_string(),
        ),
        AuthError::InvalidRequest { message } => {
            (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
        }
        AuthError::NotFound { message } => {
            (StatusCode::NOT_FOUND, "not_found", format!("{message} not found"))
        }
        AuthError::IdentityProvider { .. } => (
            StatusCode::BAD_GATEWAY,
            "temporarily_unavailable",
            "identity provider unavailable, try again".to_string(),
        ),
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "internal server error".to_string(),
        ),
    }
}

/// Builds the `WWW-Authenticate` value for 401 responses.
///
/// Format: `Bearer realm="beaver", error="invalid_token", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('"', "\\\"");
    format!("Bearer realm=\"beaver\", error=\"{error}\", error_description=\"{escaped_desc}\"")
}
