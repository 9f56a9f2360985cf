use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::{error, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::repo_types::User;
use crate::auth::services::{self, AuthError};
use crate::state::AppState;

/// Resolves the bearer token to a live user on every authenticated call.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            ))?;

        let keys = JwtKeys::from_ref(state);
        match services::resolve_current_user(state.users.as_ref(), &keys, token).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(AuthError::StoreUnavailable(e)) => {
                error!(error = %e, "user store unavailable while authenticating");
                Err((
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Store unavailable".to_string(),
                ))
            }
            Err(_) => {
                warn!("invalid or expired token");
                Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ))
            }
        }
    }
}
