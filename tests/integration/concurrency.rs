//! Concurrency integration tests.
//!
//! Many admin actions arriving at once must run one at a time and leave
//! every window consistent.

use chrono::TimeDelta;
use spotlight::storage::{EffectiveWindow, NewEntry};
use spotlight::testing::ManualClock;
use spotlight::{
    EntryStatus, InMemoryStorage, ItemKey, LockedSession, SchedulerError, SlotConfig,
    SlotScheduler, Storage,
};
use std::sync::Arc;
use std::time::Duration;

use crate::common::summer_noon;

#[tokio::test]
async fn test_concurrent_schedules_all_land() {
    let scheduler = Arc::new(SlotScheduler::new(
        InMemoryStorage::new(),
        SlotConfig::default(),
    ));

    let mut handles = Vec::new();
    for i in 0..20 {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            scheduler
                .schedule(
                    format!("evt_{i}"),
                    Some("2026-09-01T10:00"),
                    Some(f64::from(i % 5 + 1)),
                    "admin",
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entries = scheduler.list(None).await.unwrap();
    assert_eq!(entries.len(), 20);
    for entry in &entries {
        assert_eq!(
            entry.window().length().num_hours(),
            i64::from(entry.duration_hours)
        );
    }
}

#[tokio::test]
async fn test_concurrent_cancels_change_exactly_once() {
    let scheduler = Arc::new(SlotScheduler::new(
        InMemoryStorage::new(),
        SlotConfig::default(),
    ));
    let entry = scheduler
        .schedule("evt_1", Some("2026-09-01T10:00"), None, "admin")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let scheduler = scheduler.clone();
        let id = entry.id.clone();
        handles.push(tokio::spawn(async move { scheduler.cancel(&id).await }));
    }

    let mut changed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            changed += 1;
        }
    }
    assert_eq!(changed, 1);

    let cancelled = scheduler
        .list(Some(EntryStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
}

#[tokio::test]
async fn test_capacity_holds_under_concurrent_requests() {
    let config = SlotConfig::default().with_max_concurrent_active(3);
    let scheduler = Arc::new(SlotScheduler::new(InMemoryStorage::new(), config));

    let mut handles = Vec::new();
    for i in 0..10 {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            scheduler
                .schedule(format!("evt_{i}"), None, Some(4.0), "admin")
                .await
        }));
    }

    let mut accepted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(SchedulerError::CapacityExceeded { .. }) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(accepted, 3);
    assert_eq!(refused, 7);
    assert_eq!(scheduler.projection().await.unwrap().active.len(), 3);
}

#[tokio::test]
async fn test_held_lock_makes_scheduler_unavailable() {
    let storage = Arc::new(InMemoryStorage::new().with_lock_timeout(Duration::from_millis(25)));
    let scheduler = SlotScheduler::with_storage(storage.clone(), SlotConfig::default());

    let session = storage.locked_session().await.unwrap();
    let err = scheduler.projection().await.unwrap_err();
    assert!(matches!(err, SchedulerError::Unavailable(_)));
    assert!(err.to_string().starts_with("scheduler unavailable"));

    session.commit().await.unwrap();
    assert!(scheduler.projection().await.is_ok());
}

#[tokio::test]
async fn test_capacity_counts_slots_committed_while_waiting_for_lock() {
    let storage = Arc::new(InMemoryStorage::new());
    let clock = Arc::new(ManualClock::new(summer_noon()));
    let scheduler = Arc::new(
        SlotScheduler::with_storage(
            storage.clone(),
            SlotConfig::default().with_max_concurrent_active(1),
        )
        .with_clock(clock.clone()),
    );

    let mut held = storage.locked_session().await.unwrap();
    let waiting = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler
                .schedule("evt_a", None, Some(4.0), "admin")
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    clock.advance(TimeDelta::minutes(5));
    let start = summer_noon() + TimeDelta::minutes(5);
    held.create_entry(NewEntry {
        item_key: ItemKey::new("evt_b"),
        requested_start_at: start,
        duration_hours: 4,
        window: EffectiveWindow {
            start,
            end: start + TimeDelta::hours(4),
        },
        created_by: "admin".to_string(),
    })
    .await
    .unwrap();
    held.commit().await.unwrap();

    let result = waiting.await.unwrap();
    assert!(matches!(
        result,
        Err(SchedulerError::CapacityExceeded { active: 1, max: 1 })
    ));
    assert_eq!(scheduler.projection().await.unwrap().active.len(), 1);
}
