use serde::{Deserialize, Serialize};

/// Body of `POST /completion`.
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub subject_id: String,
    pub year: i32,
    pub session: String,
    pub paper: String,
    #[serde(default)]
    pub timezone: Option<String>,
    pub is_completed: bool,
    #[serde(default)]
    pub score: Option<i32>,
}

/// What the client reads back per composite key, and what each bulk
/// entry carries. `score` is absent, not null, when never set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BulkStatusResponse {
    pub status: &'static str,
    pub applied: usize,
}
