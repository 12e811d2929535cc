//! Activity and rule operations behind the HTTP API
//!
//! Store calls are blocking file I/O and run on the blocking pool; upstream
//! calls are awaited directly.

use std::sync::Arc;

use aidea_common::{time, uuid_utils, Activity, Project, Rule};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::categorizer::{self, AcceptedGrades, Categorization};
use crate::error::{ApiError, ApiResult};
use crate::store::{ActivityLog, RecordLocks, StoreError};
use crate::tempo::{self, ExportOutcome};
use crate::upstream::{ollama, RuleIndex, TempoPoster, TextGeneration, VectorSearch};

/// Remote services the tracker talks to
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn VectorSearch>,
    pub rules: Arc<dyn RuleIndex>,
    pub generator: Arc<dyn TextGeneration>,
    pub tempo: Arc<dyn TempoPoster>,
}

/// Categorization settings
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub accepted_grades: AcceptedGrades,
    pub search_limit: usize,
    pub projects: Vec<Project>,
}

pub struct ActivityService {
    store: Arc<ActivityLog>,
    records: RecordLocks,
    upstream: Collaborators,
    settings: ServiceSettings,
}

impl ActivityService {
    pub fn new(store: Arc<ActivityLog>, upstream: Collaborators, settings: ServiceSettings) -> Self {
        Self {
            store,
            records: RecordLocks::new(),
            upstream,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<ActivityLog> {
        &self.store
    }

    /// Record a new activity in today's file
    pub async fn create(&self, input_description: &str) -> ApiResult<Activity> {
        let input_description = input_description.trim();
        if input_description.is_empty() {
            return Err(ApiError::BadRequest(
                "input_description must not be empty".to_string(),
            ));
        }

        let mut activity = Activity::new(
            uuid_utils::generate_string(),
            input_description,
            time::now(),
        );
        activity.duration =
            ollama::extract_duration(self.upstream.generator.as_ref(), input_description).await?;
        self.categorize(&activity).await?.apply_to(&mut activity);

        let date = activity.created_at.date();
        let row = activity.clone();
        run_blocking(&self.store, move |s| s.append_on(date, &row)).await?;

        info!(
            activity_id = %activity.activity_id,
            grade = %activity.categorization_grade,
            categorized = activity.categorized,
            duration = %activity.duration,
            "Activity recorded"
        );
        Ok(activity)
    }

    pub async fn find(&self, id: &str, date: NaiveDate) -> ApiResult<Activity> {
        let id = id.to_string();
        run_blocking(&self.store, move |s| s.find_by_id(&id, date)).await
    }

    /// Re-extract duration and re-run categorization for a stored activity
    ///
    /// Only the duration and categorization fields are written back; the
    /// posted state stays whatever is on disk.
    pub async fn recategorize(&self, id: &str, date: NaiveDate) -> ApiResult<Activity> {
        let _guard = self.records.lock(date, id).await;
        let stored = self.find(id, date).await?;

        let duration = ollama::extract_duration(
            self.upstream.generator.as_ref(),
            &stored.input_description,
        )
        .await?;
        let decision = self.categorize(&stored).await?;

        let lookup_id = id.to_string();
        let activity = run_blocking(&self.store, move |s| {
            s.modify(&lookup_id, date, move |a| {
                a.duration = duration;
                decision.apply_to(a);
            })
        })
        .await?;

        info!(
            activity_id = id,
            %date,
            grade = %activity.categorization_grade,
            categorized = activity.categorized,
            "Activity recategorized"
        );
        Ok(activity)
    }

    pub async fn export(&self, id: &str, date: NaiveDate) -> ApiResult<ExportOutcome> {
        tempo::export(
            &self.store,
            &self.records,
            self.upstream.generator.as_ref(),
            self.upstream.tempo.as_ref(),
            date,
            id,
        )
        .await
    }

    /// Raw day-file for download
    pub async fn day_csv(&self, date: NaiveDate) -> ApiResult<Vec<u8>> {
        run_blocking(&self.store, move |s| s.read_raw(date)).await
    }

    /// Every activity of `date`
    pub async fn day_activities(&self, date: NaiveDate) -> ApiResult<Vec<Activity>> {
        run_blocking(&self.store, move |s| s.read_all(date)?.collect()).await
    }

    /// Create or merge rules in the vector index
    ///
    /// Rules without an id get a fresh one. Returns the rules as stored.
    pub async fn upsert_rules(&self, rules: Vec<Rule>) -> ApiResult<Vec<Rule>> {
        let mut stored = Vec::with_capacity(rules.len());
        for mut rule in rules {
            if rule.id.trim().is_empty() {
                rule.id = uuid_utils::generate_string();
            }
            self.upstream.rules.upsert_rule(&rule).await?;
            stored.push(rule);
        }
        info!(count = stored.len(), "Rules upserted");
        Ok(stored)
    }

    pub fn projects(&self) -> &[Project] {
        &self.settings.projects
    }

    /// Create the rule collection if missing
    pub async fn ensure_rule_collection(&self) -> ApiResult<bool> {
        Ok(self.upstream.rules.ensure_collection().await?)
    }

    async fn categorize(&self, activity: &Activity) -> ApiResult<Categorization> {
        let matches = self
            .upstream
            .search
            .nearest_neighbors(&activity.input_description, self.settings.search_limit)
            .await?;

        let decision = categorizer::decide(&matches, &self.settings.accepted_grades);
        debug!(
            activity_id = %activity.activity_id,
            candidates = matches.len(),
            distance = decision.distance,
            grade = %decision.grade,
            committed = decision.is_committed(),
            "Categorization decided"
        );
        Ok(decision)
    }
}

/// Run a store operation on the blocking pool
pub(crate) async fn run_blocking<T, F>(store: &Arc<ActivityLog>, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ActivityLog) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
        .map_err(ApiError::from)
}
