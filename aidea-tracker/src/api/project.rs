//! Project catalogue endpoint

use aidea_common::Project;
use axum::{extract::State, routing::get, Json, Router};

use crate::AppState;

/// GET /api/v1/project
///
/// Configured project / task / Jira combinations, in configuration order.
pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.service.projects().to_vec())
}

pub fn project_routes() -> Router<AppState> {
    Router::new().route("/api/v1/project", get(list_projects))
}
