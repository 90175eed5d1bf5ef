//! Projection integration tests.
//!
//! Walk a clock across promotion windows and check what the catalog sees
//! at each step.

use chrono::TimeDelta;
use spotlight::testing::catalog;
use spotlight::{EntryStatus, SlotConfig, SlotState};

use crate::common::{keys, scheduler_at, summer_noon};

#[tokio::test]
async fn test_slot_lifecycle_over_time() {
    let (scheduler, clock) = scheduler_at(summer_noon(), SlotConfig::default());
    let items = catalog(&[("evt_1", "Jazz Night")]);

    // 14:00 Berlin is 12:00 UTC; start in one hour local.
    scheduler
        .schedule("evt_1", Some("2026-06-21T15:00"), Some(2.0), "admin")
        .await
        .unwrap();

    let view = scheduler.build_queue_view(&items).await.unwrap();
    assert_eq!(view.items[0].state, SlotState::Upcoming);
    assert_eq!(view.active_count, 0);

    clock.advance(TimeDelta::minutes(90));
    let view = scheduler.build_queue_view(&items).await.unwrap();
    assert_eq!(view.items[0].state, SlotState::Active);
    assert_eq!(view.active_count, 1);
    let stamped = scheduler.apply_projection_to_items(items.clone()).await.unwrap();
    assert!(stamped[0].is_promoted);

    clock.advance(TimeDelta::hours(2));
    let view = scheduler.build_queue_view(&items).await.unwrap();
    assert_eq!(view.items[0].state, SlotState::RecentEnded);
    assert_eq!(view.items[0].entry.status, EntryStatus::Completed);
    let stamped = scheduler.apply_projection_to_items(items.clone()).await.unwrap();
    assert!(!stamped[0].is_promoted);

    clock.advance(TimeDelta::hours(72));
    let view = scheduler.build_queue_view(&items).await.unwrap();
    assert_eq!(view.items[0].state, SlotState::Completed);
}

#[tokio::test]
async fn test_projection_lists_are_ordered_by_start() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());

    for (key, start) in [
        ("third", "2026-06-24T10:00"),
        ("first", "2026-06-22T10:00"),
        ("second", "2026-06-23T10:00"),
    ] {
        scheduler
            .schedule(key, Some(start), Some(4.0), "admin")
            .await
            .unwrap();
    }

    let projection = scheduler.projection().await.unwrap();
    assert!(projection.active.is_empty());
    assert_eq!(keys(&projection.upcoming), ["first", "second", "third"]);
}

#[tokio::test]
async fn test_cancelled_recent_slot_shows_in_recent_ended() {
    let (scheduler, clock) = scheduler_at(summer_noon(), SlotConfig::default());
    let entry = scheduler
        .schedule("evt_1", None, Some(1.0), "admin")
        .await
        .unwrap();
    scheduler.cancel(&entry.id).await.unwrap();

    clock.advance(TimeDelta::hours(5));
    let projection = scheduler.projection().await.unwrap();
    assert!(projection.active.is_empty());
    assert_eq!(keys(&projection.recent_ended), ["evt_1"]);

    let view = scheduler
        .build_queue_view(&catalog(&[("evt_1", "Jazz Night")]))
        .await
        .unwrap();
    assert_eq!(view.items[0].state, SlotState::Cancelled);
}

#[tokio::test]
async fn test_recent_window_is_configurable() {
    let config = SlotConfig::default().with_recent_ended_window_hours(1);
    let (scheduler, clock) = scheduler_at(summer_noon(), config);
    scheduler
        .schedule("evt_1", None, Some(1.0), "admin")
        .await
        .unwrap();

    clock.advance(TimeDelta::minutes(90));
    assert_eq!(scheduler.projection().await.unwrap().recent_ended.len(), 1);

    clock.advance(TimeDelta::hours(1));
    assert!(scheduler.projection().await.unwrap().recent_ended.is_empty());
}

#[tokio::test]
async fn test_two_active_slots_for_one_item_earliest_wins() {
    let (scheduler, clock) = scheduler_at(summer_noon(), SlotConfig::default());
    let first = scheduler
        .schedule("evt_1", None, Some(10.0), "admin")
        .await
        .unwrap();
    clock.advance(TimeDelta::hours(1));
    scheduler
        .schedule("evt_1", None, Some(2.0), "admin")
        .await
        .unwrap();

    let stamped = scheduler
        .apply_projection_to_items(catalog(&[("evt_1", "Jazz Night")]))
        .await
        .unwrap();
    assert_eq!(stamped[0].promoted_at, Some(first.effective_start_at));
    assert_eq!(stamped[0].promoted_ends_at, Some(first.effective_end_at));
}

#[tokio::test]
async fn test_reads_run_the_completion_tick() {
    let (scheduler, clock) = scheduler_at(summer_noon(), SlotConfig::default());
    scheduler
        .schedule("evt_1", None, Some(1.0), "admin")
        .await
        .unwrap();
    let ticks_before = scheduler.storage().tick_calls();

    clock.advance(TimeDelta::hours(2));
    scheduler.projection().await.unwrap();
    scheduler.list(None).await.unwrap();

    assert_eq!(scheduler.storage().tick_calls(), ticks_before + 2);
    let completed = scheduler
        .list(Some(EntryStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
}
