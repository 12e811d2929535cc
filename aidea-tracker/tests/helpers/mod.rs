//! Shared fixtures: a temp data folder and in-process fake collaborators

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use aidea_common::{Project, Rule};
use aidea_tracker::categorizer::{AcceptedGrades, Grade, RuleMatch};
use aidea_tracker::service::{ActivityService, Collaborators, ServiceSettings};
use aidea_tracker::store::ActivityLog;
use aidea_tracker::tempo::TempoPayload;
use aidea_tracker::upstream::{
    RuleIndex, TempoPoster, TextGeneration, UpstreamError, UpstreamResult, VectorSearch,
};
use aidea_tracker::{build_router, AppState};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const PREFIX: &str = "aidea_activity_tracking";

pub fn rule_match(id: &str, jira: &str, distance: f64) -> RuleMatch {
    RuleMatch {
        rule: Rule {
            id: id.to_string(),
            project: "IZ Gateway".to_string(),
            task: "Development".to_string(),
            jira: jira.to_string(),
            description: "Coding on the Xform service".to_string(),
        },
        distance,
    }
}

/// Returns whatever candidates it currently holds
#[derive(Default)]
pub struct FakeSearch {
    pub matches: Mutex<Vec<RuleMatch>>,
    pub unavailable: Mutex<bool>,
}

impl FakeSearch {
    pub fn set(&self, matches: Vec<RuleMatch>) {
        *self.matches.lock().unwrap() = matches;
    }
}

#[async_trait]
impl VectorSearch for FakeSearch {
    async fn nearest_neighbors(&self, _query: &str, limit: usize) -> UpstreamResult<Vec<RuleMatch>> {
        if *self.unavailable.lock().unwrap() {
            return Err(UpstreamError::Unavailable {
                service: "weaviate",
                message: "connection refused".to_string(),
            });
        }
        Ok(self.matches.lock().unwrap().iter().take(limit).cloned().collect())
    }
}

/// Records upserted rules
#[derive(Default)]
pub struct FakeRules {
    pub upserted: Mutex<Vec<Rule>>,
}

#[async_trait]
impl RuleIndex for FakeRules {
    async fn ensure_collection(&self) -> UpstreamResult<bool> {
        Ok(false)
    }

    async fn upsert_rule(&self, rule: &Rule) -> UpstreamResult<()> {
        self.upserted.lock().unwrap().push(rule.clone());
        Ok(())
    }
}

/// Answers the duration prompt with `duration` and the seconds prompt with `seconds`
///
/// `duration_delay` stalls the duration prompt, standing in for a slow model.
pub struct FakeGenerator {
    pub duration: Mutex<String>,
    pub seconds: Mutex<String>,
    pub duration_delay: Mutex<Duration>,
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self {
            duration: Mutex::new("1h 15m\n".to_string()),
            seconds: Mutex::new("4500".to_string()),
            duration_delay: Mutex::new(Duration::ZERO),
        }
    }
}

#[async_trait]
impl TextGeneration for FakeGenerator {
    async fn complete(&self, system: &str, _prompt: &str) -> UpstreamResult<String> {
        if system.contains("seconds") {
            return Ok(self.seconds.lock().unwrap().clone());
        }

        let delay = *self.duration_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.duration.lock().unwrap().clone())
    }
}

type PostHook = Box<dyn FnOnce() + Send>;

/// Records every worklog; optionally runs a hook while "posting"
///
/// `delay` stalls each post after it is recorded.
#[derive(Default)]
pub struct FakeTempo {
    pub posts: Mutex<Vec<TempoPayload>>,
    pub on_post: Mutex<Option<PostHook>>,
    pub delay: Mutex<Duration>,
}

impl FakeTempo {
    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl TempoPoster for FakeTempo {
    async fn post(&self, payload: &TempoPayload) -> UpstreamResult<Value> {
        self.posts.lock().unwrap().push(payload.clone());
        if let Some(hook) = self.on_post.lock().unwrap().take() {
            hook();
        }

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(json!({ "tempoWorklogId": 1 }))
    }
}

/// Temp data folder plus fakes wired into a service
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<ActivityLog>,
    pub search: Arc<FakeSearch>,
    pub rules: Arc<FakeRules>,
    pub generator: Arc<FakeGenerator>,
    pub tempo: Arc<FakeTempo>,
    pub projects: Vec<Project>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ActivityLog::new(dir.path(), PREFIX));
        Self {
            dir,
            store,
            search: Arc::new(FakeSearch::default()),
            rules: Arc::new(FakeRules::default()),
            generator: Arc::new(FakeGenerator::default()),
            tempo: Arc::new(FakeTempo::default()),
            projects: vec![Project {
                project_name: "IZ Gateway".to_string(),
                task: "Development".to_string(),
                jira: "IZG-42".to_string(),
            }],
        }
    }

    pub fn service(&self) -> ActivityService {
        let collaborators = Collaborators {
            search: self.search.clone(),
            rules: self.rules.clone(),
            generator: self.generator.clone(),
            tempo: self.tempo.clone(),
        };
        let settings = ServiceSettings {
            accepted_grades: AcceptedGrades::new([Grade::A, Grade::B]),
            search_limit: 10,
            projects: self.projects.clone(),
        };
        ActivityService::new(self.store.clone(), collaborators, settings)
    }

    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.service()))
    }
}
