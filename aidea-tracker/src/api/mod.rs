//! HTTP API handlers for aidea-tracker

pub mod activity;
pub mod health;
pub mod project;
pub mod rule;

pub use activity::activity_routes;
pub use health::health_routes;
pub use project::project_routes;
pub use rule::rule_routes;

use aidea_common::{time, uuid_utils};
use axum::http::{header, HeaderMap};
use chrono::NaiveDate;

use crate::error::{ApiError, ApiResult};

/// `YYYYMMDD` path segment to a calendar date
pub(crate) fn parse_date(raw: &str) -> ApiResult<NaiveDate> {
    time::parse_date_stamp(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid date '{raw}', expected YYYYMMDD")))
}

/// Activity id path segment, lowercase hex and dashes
pub(crate) fn check_id(raw: &str) -> ApiResult<&str> {
    if uuid_utils::is_activity_id(raw) {
        Ok(raw)
    } else {
        Err(ApiError::BadRequest(format!("Invalid activity id '{raw}'")))
    }
}

/// Media type of the request body without parameters, lowercased
pub(crate) fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}
