//! Rule upload endpoint

use aidea_common::Rule;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use super::content_type;
use crate::error::{ApiError, ApiResult};
use crate::rules::parse_rule_upload;
use crate::AppState;

/// POST /api/v1/rule
///
/// `application/json` upserts one rule and echoes it back; `text/csv` upserts
/// a table of rules and reports how many were processed.
pub async fn save_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    match content_type(&headers).as_str() {
        "application/json" => {
            let rule: Rule = serde_json::from_slice(&body)
                .map_err(|e| ApiError::BadRequest(format!("Error parsing JSON: {e}")))?;

            let mut stored = state.service.upsert_rules(vec![rule]).await?;
            let rule = stored
                .pop()
                .ok_or_else(|| ApiError::Internal("rule upsert returned nothing".to_string()))?;
            Ok((StatusCode::CREATED, Json(rule)).into_response())
        }
        "text/csv" => {
            let text = std::str::from_utf8(&body)
                .map_err(|e| ApiError::BadRequest(format!("CSV body is not UTF-8: {e}")))?;
            let rules = parse_rule_upload(text)?;
            let count = state.service.upsert_rules(rules).await?.len();

            let body = json!({
                "message": format!("Successfully processed {count} rules"),
                "count": count,
            });
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        other => Err(ApiError::UnsupportedMediaType(format!(
            "Content-Type must be application/json or text/csv, got '{other}'"
        ))),
    }
}

pub fn rule_routes() -> Router<AppState> {
    Router::new().route("/api/v1/rule", post(save_rules))
}
