//! aidea-tracker library
//!
//! Records free-text work activities in day-partitioned CSV files,
//! categorizes them against a vector index of rules, and exports them to
//! Jira/Tempo. The binary wires this library to real HTTP collaborators;
//! integration tests wire it to in-process fakes.

pub mod api;
pub mod categorizer;
pub mod config;
pub mod error;
pub mod rules;
pub mod service;
pub mod store;
pub mod tempo;
pub mod upstream;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::service::ActivityService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ActivityService>,
    /// Reported as uptime by `/health`
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: ActivityService) -> Self {
        Self {
            service: Arc::new(service),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::activity_routes())
        .merge(api::rule_routes())
        .merge(api::project_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
