use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        services::{self, AuthError},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn error_response(e: AuthError) -> (StatusCode, String) {
    let status = match &e {
        AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AuthError::StoreUnavailable(source) => {
            error!(error = %source, "store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
        AuthError::Internal(source) => {
            error!(error = %source, "internal auth error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

fn auth_response(token: String, user: crate::auth::repo_types::User) -> AuthResponse {
    AuthResponse {
        access_token: token,
        token_type: "bearer",
        user: PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Username required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let (token, user) = services::register(
        state.users.as_ref(),
        &keys,
        &payload.username,
        &payload.email,
        &payload.password,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(auth_response(token, user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let (token, user) = services::login(
        state.users.as_ref(),
        &keys,
        payload.username.trim(),
        &payload.password,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(auth_response(token, user)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: user.id,
        username: user.username,
        email: user.email,
    })
}
