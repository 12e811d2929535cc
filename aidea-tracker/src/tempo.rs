//! Tempo export state tracking
//!
//! An activity is either a draft (`posted_to_tracker = false`) or posted.
//! Exporting a draft converts its duration to seconds, POSTs one worklog and
//! then records the posted state in the day-file. Exporting a posted
//! activity does nothing and says so.
//!
//! Once the worklog POST succeeds the export is reported as successful even
//! if the day-file cannot be updated afterwards. The failure is logged and
//! surfaced as `persisted: false`; a later export of the same activity will
//! post again.
//!
//! The whole export holds the activity's record lock, so concurrent exports
//! of one activity post at most once.

use std::sync::Arc;

use aidea_common::Activity;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::{ApiError, ApiResult};
use crate::service::run_blocking;
use crate::store::{ActivityLog, RecordLocks};
use crate::upstream::{ollama, TempoPoster, TextGeneration};

pub const ALREADY_POSTED_MESSAGE: &str = "Activity has already been posted to Jira/Tempo";

/// Worklog body sent to the Tempo endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoPayload {
    pub issue_key: String,
    pub time_spent_seconds: i64,
    /// `YYYY-MM-DD`
    pub start_date: String,
    pub description: String,
}

impl TempoPayload {
    pub fn for_activity(activity: &Activity, seconds: i64) -> Self {
        Self {
            issue_key: activity.jira.clone(),
            time_spent_seconds: seconds,
            start_date: activity.created_at.date().format("%Y-%m-%d").to_string(),
            description: activity.input_description.clone(),
        }
    }
}

/// Result of an export request
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Nothing sent; the activity was exported earlier
    AlreadyPosted,
    /// Worklog sent
    Posted {
        /// False if the posted state could not be written back
        persisted: bool,
        /// Body returned by the endpoint
        response: Value,
    },
}

impl ExportOutcome {
    /// JSON body returned to HTTP clients
    pub fn to_json(&self) -> Value {
        match self {
            ExportOutcome::AlreadyPosted => json!({
                "status": "already_posted",
                "message": ALREADY_POSTED_MESSAGE,
            }),
            ExportOutcome::Posted { persisted, response } => json!({
                "status": "posted",
                "persisted": persisted,
                "response": response,
            }),
        }
    }
}

/// Export activity `id` of `date` to Tempo
pub async fn export(
    store: &Arc<ActivityLog>,
    records: &RecordLocks,
    generator: &dyn TextGeneration,
    poster: &dyn TempoPoster,
    date: NaiveDate,
    id: &str,
) -> ApiResult<ExportOutcome> {
    let _guard = records.lock(date, id).await;

    let lookup_id = id.to_string();
    let activity = run_blocking(store, move |s| s.find_by_id(&lookup_id, date)).await?;

    if activity.posted_to_tracker {
        info!(activity_id = id, %date, "Export skipped, already posted");
        return Ok(ExportOutcome::AlreadyPosted);
    }

    if activity.jira.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Activity {id} has no Jira issue; categorize it before exporting"
        )));
    }

    let seconds = ollama::duration_seconds(generator, &activity.duration).await?;
    let payload = TempoPayload::for_activity(&activity, seconds);
    let response = poster.post(&payload).await?;

    let mark_id = id.to_string();
    let marked = run_blocking(store, move |s| {
        s.modify(&mark_id, date, |a| a.posted_to_tracker = true)
    })
    .await;
    let persisted = match marked {
        Ok(_) => true,
        Err(e) => {
            error!(
                activity_id = id,
                %date,
                error = %e,
                "Worklog posted but activity could not be marked as posted"
            );
            false
        }
    };

    info!(activity_id = id, %date, seconds, persisted, "Activity exported");
    Ok(ExportOutcome::Posted { persisted, response })
}
