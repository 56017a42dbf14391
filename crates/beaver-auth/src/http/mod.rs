//! Axum handlers for the auth HTTP surface.
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | POST | `/auth/device` | none |
//! | POST | `/auth/device/poll` | none |
//! | POST | `/auth/refresh` | refresh token in body |
//! | POST | `/auth/logout` | refresh token in body |
//! | GET | `/auth/me` | Bearer or Session |
//! | POST, GET, DELETE | `/api/v1/service-access-tokens` | Bearer or Session |

pub mod device;
pub mod service_tokens;
pub mod session;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};

use crate::middleware::AuthState;

pub use device::{PollRequest, poll_device_flow, start_device_flow};
pub use service_tokens::{
    CreateServiceTokenRequest, RevokeServiceTokenParams, create_service_token,
    list_service_tokens, revoke_service_token,
};
pub use session::{
    LogoutRequest, LogoutResponse, RefreshRequest, current_user, logout, refresh_session,
};

/// Routes for every auth endpoint, for any state that can provide [`AuthState`].
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    AuthState: FromRef<S>,
{
    Router::new()
        .route("/auth/device", post(start_device_flow))
        .route("/auth/device/poll", post(poll_device_flow))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(current_user))
        .route(
            "/api/v1/service-access-tokens",
            post(create_service_token)
                .get(list_service_tokens)
                .delete(revoke_service_token),
        )
}
