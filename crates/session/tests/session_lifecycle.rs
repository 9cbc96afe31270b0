use std::sync::Arc;

use quagmire_common::SessionConfig;
use quagmire_session::{
    EndedSession, ManualClock, MemoryStore, SessionStore, SessionTracker, VisitOutcome,
};

fn tracker(prefix: &str) -> (Arc<ManualClock>, Arc<MemoryStore>, SessionTracker) {
    let config = SessionConfig {
        key_prefix: prefix.to_string(),
        active_ttl_secs: 180,
        history_ttl_secs: 86_400,
        scan_count: 7,
        ..SessionConfig::default()
    };
    let clock = Arc::new(ManualClock::new(1_000));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let tracker = SessionTracker::new(store.clone(), &config).with_clock(clock.clone());
    (clock, store, tracker)
}

#[tokio::test]
async fn test_crawler_returning_after_idle_gap() {
    let (clock, _, tracker) = tracker("trap");

    // A crawler keeps hitting pages every 30s for five minutes.
    for _ in 0..10 {
        tracker.record_visit("203.0.113.9").await.unwrap();
        clock.advance(30);
    }
    // Last visit was at 1_270; it goes quiet past the active window.
    clock.advance(600);

    let outcome = tracker.record_visit("203.0.113.9").await.unwrap();
    assert_eq!(
        outcome,
        VisitOutcome::Started {
            previous: Some(EndedSession {
                first_seen: 1_000,
                last_seen: 1_270,
                dwell_secs: 270,
            })
        }
    );

    let info = tracker.session_info("203.0.113.9").await.unwrap();
    assert_eq!(info.first_seen, Some(1_900));
    assert_eq!(info.dwell_secs, Some(0));
}

#[tokio::test]
async fn test_addresses_are_tracked_independently() {
    let (clock, _, tracker) = tracker("trap");

    tracker.record_visit("198.51.100.1").await.unwrap();
    clock.advance(100);
    tracker.record_visit("198.51.100.2").await.unwrap();
    clock.advance(100);

    // .1 lapsed at 1_180, .2 is still within its window.
    let first = tracker.record_visit("198.51.100.1").await.unwrap();
    let second = tracker.record_visit("198.51.100.2").await.unwrap();
    assert!(matches!(first, VisitOutcome::Started { previous: Some(_) }));
    assert_eq!(second, VisitOutcome::Refreshed);
}

#[tokio::test]
async fn test_roster_pages_and_prefix_isolation() {
    let (_, store, tracker) = tracker("trap");
    for i in 0..20 {
        tracker.record_visit(&format!("192.0.2.{}", i)).await.unwrap();
    }
    // Keys under another prefix must not leak into the roster.
    store
        .set_ex("other:roster:10.0.0.1", "1", std::time::Duration::from_secs(60))
        .await
        .unwrap();

    let mut ips = tracker.list_active_ips().await.unwrap();
    ips.sort();
    assert_eq!(ips.len(), 20);
    assert!(ips.iter().all(|ip| ip.starts_with("192.0.2.")));
}

#[tokio::test]
async fn test_concurrent_visits_from_many_addresses() {
    let (_, _, tracker) = tracker("trap");
    let tracker = Arc::new(tracker);

    let mut handles = Vec::new();
    for i in 0..16 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            let ip = format!("10.1.0.{}", i);
            for _ in 0..5 {
                tracker.record_visit(&ip).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(tracker.list_active_ips().await.unwrap().len(), 16);
}
