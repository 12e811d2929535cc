//! Concurrent access to one day-file
//!
//! Appends and updates racing on the same date must neither lose rows nor
//! duplicate the header. Service operations racing on one activity must
//! post it at most once and never clear its posted state.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use aidea_common::Activity;
use aidea_tracker::store::ActivityLog;
use aidea_tracker::tempo::ExportOutcome;
use chrono::NaiveDate;
use tokio::task::JoinSet;

mod helpers;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 13).unwrap()
}

fn activity(n: usize) -> Activity {
    Activity {
        duration: "15m".to_string(),
        ..Activity::new(
            format!("{:08x}", n),
            format!("concurrent item {n}"),
            date().and_hms_opt(12, 0, 0).unwrap(),
        )
    }
}

#[test]
fn test_concurrent_appends_keep_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ActivityLog::new(dir.path(), helpers::PREFIX));
    const WRITERS: usize = 16;
    const PER_WRITER: usize = 10;

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    store.append_on(date(), &activity(w * PER_WRITER + i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let content = std::fs::read_to_string(store.path_for(date())).unwrap();
    assert_eq!(content.lines().count(), WRITERS * PER_WRITER + 1);
    assert_eq!(content.matches("ActivityId").count(), 1);

    let mut ids: Vec<String> = store
        .read_all(date())
        .unwrap()
        .map(|r| r.unwrap().activity_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), WRITERS * PER_WRITER);
}

#[test]
fn test_updates_racing_appends_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ActivityLog::new(dir.path(), helpers::PREFIX));
    for n in 0..5 {
        store.append_on(date(), &activity(n)).unwrap();
    }

    let appender = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for n in 5..55 {
                store.append_on(date(), &activity(n)).unwrap();
            }
        })
    };
    let updater = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for round in 0..50 {
                let mut row = store.find_by_id(&format!("{:08x}", round % 5), date()).unwrap();
                row.duration = format!("{}m", round + 1);
                store.update(&row, date()).unwrap();
            }
        })
    };
    appender.join().unwrap();
    updater.join().unwrap();

    let rows: Vec<Activity> = store.read_all(date()).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 55);
    // Last round touching row 0 is round 45
    assert_eq!(rows[0].duration, "46m");
}

#[tokio::test]
async fn test_concurrent_creates_through_service() {
    let harness = helpers::Harness::new();
    harness.search.set(vec![helpers::rule_match(
        "5b6a1f0e-8c57-4b8d-9e3c-1a2b3c4d5e6f",
        "IZG-42",
        0.1,
    )]);
    let service = Arc::new(harness.service());

    let mut join_set = JoinSet::new();
    for i in 0..20 {
        let service = Arc::clone(&service);
        join_set.spawn(async move { service.create(&format!("parallel work {i}")).await });
    }

    let mut created = Vec::new();
    while let Some(result) = join_set.join_next().await {
        created.push(result.unwrap().unwrap());
    }

    let date = created[0].created_at.date();
    let stored = service.day_activities(date).await.unwrap();
    // Creations straddling midnight land in the next day's file
    let on_day = created.iter().filter(|a| a.created_at.date() == date).count();
    assert_eq!(stored.len(), on_day);
    for activity in &created {
        let found = service.find(&activity.activity_id, activity.created_at.date()).await.unwrap();
        assert_eq!(&found, activity);
    }
}

/// Store one exportable activity `a1` on `date()`
fn seed_exportable(harness: &helpers::Harness) {
    let activity = Activity {
        project: "IZ Gateway".to_string(),
        task: "Development".to_string(),
        jira: "FEDS-148".to_string(),
        duration: "1h 15m".to_string(),
        categorized: true,
        ..Activity::new("a1", "Xform service coding", date().and_hms_opt(16, 45, 3).unwrap())
    };
    harness.store.append_on(date(), &activity).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exports_post_once() {
    let harness = helpers::Harness::new();
    seed_exportable(&harness);
    *harness.tempo.delay.lock().unwrap() = Duration::from_millis(200);
    let service = harness.service();

    let (a, b) = tokio::join!(service.export("a1", date()), service.export("a1", date()));
    let outcomes = [a.unwrap(), b.unwrap()];

    let posted = outcomes
        .iter()
        .filter(|o| matches!(o, ExportOutcome::Posted { persisted: true, .. }))
        .count();
    assert_eq!(posted, 1);
    assert!(outcomes.contains(&ExportOutcome::AlreadyPosted));
    assert_eq!(harness.tempo.post_count(), 1);
    assert!(harness.store.find_by_id("a1", date()).unwrap().posted_to_tracker);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_export_during_recategorize_stays_posted() {
    let harness = helpers::Harness::new();
    seed_exportable(&harness);
    harness.search.set(vec![helpers::rule_match(
        "5b6a1f0e-8c57-4b8d-9e3c-1a2b3c4d5e6f",
        "IZG-42",
        0.1,
    )]);
    *harness.generator.duration.lock().unwrap() = "30m".to_string();
    *harness.generator.duration_delay.lock().unwrap() = Duration::from_millis(300);
    let service = Arc::new(harness.service());

    let recategorize = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.recategorize("a1", date()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = service.export("a1", date()).await.unwrap();
    assert!(matches!(outcome, ExportOutcome::Posted { persisted: true, .. }));
    recategorize.await.unwrap().unwrap();

    let stored = harness.store.find_by_id("a1", date()).unwrap();
    assert!(stored.posted_to_tracker);
    assert_eq!(stored.duration, "30m");
    assert_eq!(stored.jira, "IZG-42");

    // The worklog went out with the recategorized issue and duration
    let payload = harness.tempo.posts.lock().unwrap()[0].clone();
    assert_eq!(payload.issue_key, "IZG-42");

    let again = service.export("a1", date()).await.unwrap();
    assert_eq!(again, ExportOutcome::AlreadyPosted);
    assert_eq!(harness.tempo.post_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recategorize_during_export_keeps_posted_state() {
    let harness = helpers::Harness::new();
    seed_exportable(&harness);
    harness.search.set(vec![helpers::rule_match(
        "5b6a1f0e-8c57-4b8d-9e3c-1a2b3c4d5e6f",
        "IZG-42",
        0.1,
    )]);
    *harness.tempo.delay.lock().unwrap() = Duration::from_millis(200);
    let service = Arc::new(harness.service());

    let export = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.export("a1", date()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let updated = service.recategorize("a1", date()).await.unwrap();
    assert!(updated.posted_to_tracker);
    assert!(matches!(
        export.await.unwrap().unwrap(),
        ExportOutcome::Posted { persisted: true, .. }
    ));

    assert_eq!(harness.tempo.posts.lock().unwrap()[0].issue_key, "FEDS-148");
    assert!(harness.store.find_by_id("a1", date()).unwrap().posted_to_tracker);
    assert_eq!(
        service.export("a1", date()).await.unwrap(),
        ExportOutcome::AlreadyPosted
    );
    assert_eq!(harness.tempo.post_count(), 1);
}
