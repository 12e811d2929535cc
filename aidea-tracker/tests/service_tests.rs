//! Activity service flows against fake collaborators

use std::fs;

use aidea_common::{Activity, Rule};
use aidea_tracker::categorizer::NOT_APPLICABLE;
use aidea_tracker::tempo::ExportOutcome;
use aidea_tracker::ApiError;
use axum::http::StatusCode;
use chrono::NaiveDate;

mod helpers;

use helpers::{rule_match, Harness};

const RULE_ID: &str = "5b6a1f0e-8c57-4b8d-9e3c-1a2b3c4d5e6f";

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 13).unwrap()
}

/// Seed one stored activity on `day()`
fn seed(harness: &Harness, id: &str, jira: &str, posted: bool) -> Activity {
    let activity = Activity {
        project: "IZ Gateway".to_string(),
        task: "Development".to_string(),
        jira: jira.to_string(),
        duration: "1h 15m".to_string(),
        categorized: !jira.is_empty(),
        posted_to_tracker: posted,
        ..Activity::new(id, "Xform service coding", day().and_hms_opt(16, 45, 3).unwrap())
    };
    harness.store.append_on(day(), &activity).unwrap();
    activity
}

#[tokio::test]
async fn test_create_commits_accepted_grade() {
    let harness = Harness::new();
    harness.search.set(vec![
        rule_match("7c1d2e3f-0000-4000-8000-000000000001", "IZG-1", 0.55),
        rule_match(RULE_ID, "IZG-42", 0.12),
    ]);

    let activity = harness.service().create("  coded the Xform service for 75 minutes ").await.unwrap();

    assert_eq!(activity.input_description, "coded the Xform service for 75 minutes");
    assert_eq!(activity.duration, "1h 15m");
    assert_eq!(activity.categorization_grade, "A");
    assert_eq!(activity.weaviate_id, RULE_ID);
    assert_eq!(activity.jira, "IZG-42");
    assert!(activity.categorized);
    assert!(!activity.posted_to_tracker);

    let stored = harness
        .store
        .find_by_id(&activity.activity_id, activity.created_at.date())
        .unwrap();
    assert_eq!(stored, activity);
}

#[tokio::test]
async fn test_create_rejected_grade_records_nearest_match_only() {
    let harness = Harness::new();
    harness.search.set(vec![rule_match(RULE_ID, "IZG-42", 0.5)]);

    let activity = harness.service().create("lunch").await.unwrap();

    assert_eq!(activity.categorization_grade, "C");
    assert_eq!(activity.weaviate_id, RULE_ID);
    assert!(!activity.categorized);
    assert!(activity.project.is_empty() && activity.task.is_empty() && activity.jira.is_empty());
}

#[tokio::test]
async fn test_create_without_candidates() {
    let harness = Harness::new();
    let activity = harness.service().create("something new").await.unwrap();
    assert_eq!(activity.categorization_grade, NOT_APPLICABLE);
    assert_eq!(activity.rule_description, NOT_APPLICABLE);
    assert!(!activity.categorized);
}

#[tokio::test]
async fn test_create_blank_description_is_rejected() {
    let harness = Harness::new();
    let err = harness.service().create("   ").await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
    assert_eq!(fs::read_dir(harness.dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_create_with_search_down_is_unavailable() {
    let harness = Harness::new();
    *harness.search.unavailable.lock().unwrap() = true;
    let err = harness.service().create("work").await.unwrap_err();
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_recategorize_clears_stale_category() {
    let harness = Harness::new();
    seed(&harness, "a1", "IZG-42", false);
    harness.search.set(vec![rule_match(RULE_ID, "IZG-99", 0.8)]);
    *harness.generator.duration.lock().unwrap() = "30m".to_string();

    let updated = harness.service().recategorize("a1", day()).await.unwrap();

    assert_eq!(updated.categorization_grade, "D");
    assert!(!updated.categorized);
    assert!(updated.jira.is_empty());
    assert_eq!(updated.duration, "30m");
    assert_eq!(harness.store.find_by_id("a1", day()).unwrap(), updated);
}

#[tokio::test]
async fn test_export_posts_once_then_short_circuits() {
    let harness = Harness::new();
    seed(&harness, "a1", "FEDS-148", false);
    let service = harness.service();

    let first = service.export("a1", day()).await.unwrap();
    assert!(matches!(first, ExportOutcome::Posted { persisted: true, .. }));

    let second = service.export("a1", day()).await.unwrap();
    assert_eq!(second, ExportOutcome::AlreadyPosted);

    assert_eq!(harness.tempo.post_count(), 1);
    let payload = harness.tempo.posts.lock().unwrap()[0].clone();
    assert_eq!(payload.issue_key, "FEDS-148");
    assert_eq!(payload.time_spent_seconds, 4500);
    assert_eq!(payload.start_date, "2025-05-13");
    assert!(harness.store.find_by_id("a1", day()).unwrap().posted_to_tracker);
}

#[tokio::test]
async fn test_export_already_posted_never_calls_endpoint() {
    let harness = Harness::new();
    seed(&harness, "a1", "FEDS-148", true);

    let outcome = harness.service().export("a1", day()).await.unwrap();
    assert_eq!(outcome, ExportOutcome::AlreadyPosted);
    assert_eq!(harness.tempo.post_count(), 0);
}

#[tokio::test]
async fn test_export_persistence_failure_still_reports_success() {
    let harness = Harness::new();
    seed(&harness, "a1", "FEDS-148", false);
    let path = harness.store.path_for(day());
    *harness.tempo.on_post.lock().unwrap() = Some(Box::new(move || {
        fs::remove_file(&path).unwrap();
    }));

    let outcome = harness.service().export("a1", day()).await.unwrap();

    assert!(matches!(outcome, ExportOutcome::Posted { persisted: false, .. }));
    assert_eq!(harness.tempo.post_count(), 1);
}

#[tokio::test]
async fn test_export_requires_jira() {
    let harness = Harness::new();
    seed(&harness, "a1", "", false);

    let err = harness.service().export("a1", day()).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
    assert_eq!(harness.tempo.post_count(), 0);
}

#[tokio::test]
async fn test_export_unconvertible_duration() {
    let harness = Harness::new();
    let mut activity = seed(&harness, "a1", "FEDS-148", false);
    activity.duration = "a while".to_string();
    harness.store.update(&activity, day()).unwrap();
    *harness.generator.seconds.lock().unwrap() = "unknown".to_string();

    let err = harness.service().export("a1", day()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(harness.tempo.post_count(), 0);
}

#[tokio::test]
async fn test_missing_day_and_missing_row() {
    let harness = Harness::new();
    let service = harness.service();

    let err = service.find("a1", day()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    seed(&harness, "a1", "FEDS-148", false);
    let err = service.find("b2", day()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upsert_rules_assigns_missing_ids() {
    let harness = Harness::new();
    let rules = vec![
        Rule {
            project: "IZ Gateway".to_string(),
            description: "Standup".to_string(),
            ..Rule::default()
        },
        Rule {
            id: RULE_ID.to_string(),
            ..Rule::default()
        },
    ];

    let stored = harness.service().upsert_rules(rules).await.unwrap();

    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].id.len(), 36);
    assert_eq!(stored[1].id, RULE_ID);
    assert_eq!(*harness.rules.upserted.lock().unwrap(), stored);
}
