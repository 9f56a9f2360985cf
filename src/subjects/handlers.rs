use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::{auth::extractors::AuthUser, state::AppState, subjects::repo::SubjectSnapshot};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectList {
    pub subjects: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub fn subject_routes() -> Router<AppState> {
    Router::new().route("/subjects", get(get_subjects).post(save_subjects))
}

fn store_unavailable(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "subject store unavailable");
    (StatusCode::SERVICE_UNAVAILABLE, "Store unavailable".into())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_subjects(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SubjectList>, (StatusCode, String)> {
    let snapshot = SubjectSnapshot::find_by_user(&state.db, user.id)
        .await
        .map_err(store_unavailable)?;

    let subjects = snapshot
        .map(|s| serde_json::from_value::<Vec<String>>(s.subjects).unwrap_or_default())
        .unwrap_or_default();

    Ok(Json(SubjectList { subjects }))
}

#[instrument(skip_all, fields(user_id = %user.id, count = payload.subjects.len()))]
pub async fn save_subjects(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<SubjectList>,
) -> Result<Json<SaveResponse>, (StatusCode, String)> {
    SubjectSnapshot::save(&state.db, user.id, &payload.subjects)
        .await
        .map_err(store_unavailable)?;

    Ok(Json(SaveResponse {
        status: "success",
        message: "Subjects saved successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_list_roundtrips_through_json() {
        let list = SubjectList {
            subjects: vec!["Biology".into(), "Chemistry".into()],
        };
        let json = serde_json::to_string(&list).unwrap();
        let back: SubjectList = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subjects, list.subjects);
    }
}
