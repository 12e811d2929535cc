//! Activity endpoints
//!
//! - `POST  /api/v1/activity`
//! - `GET   /api/v1/activity/csv/today`, `/api/v1/activity/csv/:date`
//! - `GET   /api/v1/activity/json/:date`
//! - `GET   /api/v1/activity/:id`, `/api/v1/activity/:date/:id`
//! - `PATCH /api/v1/activity/recategorize/:id`, `/api/v1/activity/recategorize/:date/:id`
//! - `POST  /api/v1/activity/tempo/:date/:id`

use aidea_common::{time, Activity};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use super::{check_id, content_type, parse_date};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of `POST /api/v1/activity`
#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub input_description: String,
}

/// POST /api/v1/activity
pub async fn create_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Activity>)> {
    let media = content_type(&headers);
    if media != "application/json" {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Content-Type must be application/json, got '{media}'"
        )));
    }

    let request: CreateActivityRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Error parsing JSON: {e}")))?;

    let activity = state.service.create(&request.input_description).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// GET /api/v1/activity/csv/today
pub async fn today_csv(State(state): State<AppState>) -> ApiResult<Response> {
    day_csv(&state, time::today()).await
}

/// GET /api/v1/activity/csv/:date
pub async fn dated_csv(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<Response> {
    day_csv(&state, parse_date(&date)?).await
}

async fn day_csv(state: &AppState, date: NaiveDate) -> ApiResult<Response> {
    let bytes = state.service.day_csv(date).await?;
    let file_name = state.service.store().file_name(date);
    let disposition = format!("attachment; filename=\"{file_name}\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/v1/activity/json/:date
pub async fn dated_json(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<Json<Vec<Activity>>> {
    let activities = state.service.day_activities(parse_date(&date)?).await?;
    Ok(Json(activities))
}

/// GET /api/v1/activity/:id
pub async fn get_today(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Activity>> {
    let activity = state.service.find(check_id(&id)?, time::today()).await?;
    Ok(Json(activity))
}

/// GET /api/v1/activity/:date/:id
pub async fn get_dated(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
) -> ApiResult<Json<Activity>> {
    let date = parse_date(&date)?;
    let activity = state.service.find(check_id(&id)?, date).await?;
    Ok(Json(activity))
}

/// PATCH /api/v1/activity/recategorize/:id
pub async fn recategorize_today(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Activity>> {
    let activity = state
        .service
        .recategorize(check_id(&id)?, time::today())
        .await?;
    Ok(Json(activity))
}

/// PATCH /api/v1/activity/recategorize/:date/:id
pub async fn recategorize_dated(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
) -> ApiResult<Json<Activity>> {
    let date = parse_date(&date)?;
    let activity = state.service.recategorize(check_id(&id)?, date).await?;
    Ok(Json(activity))
}

/// POST /api/v1/activity/tempo/:date/:id
pub async fn export_to_tempo(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let date = parse_date(&date)?;
    let outcome = state.service.export(check_id(&id)?, date).await?;
    Ok(Json(outcome.to_json()))
}

/// Activity routes
///
/// `:key` is an id in one-segment routes and a date in two-segment routes;
/// handlers extract positionally.
pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/activity", post(create_activity))
        .route("/api/v1/activity/csv/today", get(today_csv))
        .route("/api/v1/activity/csv/:date", get(dated_csv))
        .route("/api/v1/activity/json/:date", get(dated_json))
        .route("/api/v1/activity/recategorize/:key", patch(recategorize_today))
        .route(
            "/api/v1/activity/recategorize/:key/:id",
            patch(recategorize_dated),
        )
        .route("/api/v1/activity/tempo/:date/:id", post(export_to_tempo))
        .route("/api/v1/activity/:key", get(get_today))
        .route("/api/v1/activity/:key/:id", get(get_dated))
}
