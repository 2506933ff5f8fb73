use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::types::{AppState, LatestStatus};

#[derive(Debug, Serialize)]
pub(crate) struct LatestResponse {
    ready: bool,
    #[serde(flatten)]
    status: Option<LatestStatus>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn latest(State(state): State<AppState>) -> Json<LatestResponse> {
    let status = state.latest.read().await.as_deref().cloned();
    Json(LatestResponse {
        ready: status.is_some(),
        status,
    })
}
