use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use crate::{
    auth::extractors::AuthUser,
    papers::{
        dto::{BulkStatusResponse, CompletionEntry, CompletionRequest, StatusResponse},
        key::PaperKey,
        services::{self, CompletionError},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/completion", get(get_completion))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/completion", post(update_completion))
        .route("/completion/bulk", post(bulk_update_completion))
}

fn error_response(e: CompletionError) -> (StatusCode, String) {
    let status = match &e {
        CompletionError::InvalidKey(_) | CompletionError::InvalidScore(_) => {
            StatusCode::BAD_REQUEST
        }
        CompletionError::StoreUnavailable(source) => {
            error!(error = %source, "completion store unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, e.to_string())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_completion(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CompletionRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let key = PaperKey::new(
        payload.subject_id,
        payload.year,
        payload.session,
        payload.paper,
        payload.timezone,
    );
    services::upsert_completion(
        state.completions.as_ref(),
        user.id,
        &key,
        payload.is_completed,
        payload.score,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(StatusResponse { status: "success" }))
}

#[instrument(skip_all, fields(user_id = %user.id, entries = payload.len()))]
pub async fn bulk_update_completion(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<BTreeMap<String, CompletionEntry>>,
) -> Result<Json<BulkStatusResponse>, (StatusCode, String)> {
    let applied = services::bulk_upsert_completion(state.completions.as_ref(), user.id, &payload)
        .await
        .map_err(error_response)?;

    Ok(Json(BulkStatusResponse {
        status: "success",
        applied,
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_completion(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<HashMap<String, CompletionEntry>>, (StatusCode, String)> {
    let map = services::list_completion(state.completions.as_ref(), user.id)
        .await
        .map_err(error_response)?;
    Ok(Json(map))
}
