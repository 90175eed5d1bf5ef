//! Scheduling integration tests.
//!
//! Drive the scheduler the way the admin console does: local wall-clock
//! input in, stored UTC windows out.

use chrono::TimeDelta;
use spotlight::{EntryId, EntryStatus, SchedulerError, SlotConfig, to_iso};

use crate::common::{keys, scheduler_at, summer_noon};

#[tokio::test]
async fn test_summer_local_start_is_stored_in_utc() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());

    let entry = scheduler
        .schedule("evt_1", Some("2026-06-21T18:00"), Some(48.0), "admin")
        .await
        .unwrap();

    assert_eq!(to_iso(entry.requested_start_at), "2026-06-21T16:00:00.000Z");
    assert_eq!(to_iso(entry.effective_start_at), "2026-06-21T16:00:00.000Z");
    assert_eq!(to_iso(entry.effective_end_at), "2026-06-23T16:00:00.000Z");
}

#[tokio::test]
async fn test_winter_local_start_uses_standard_offset() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());

    let entry = scheduler
        .schedule("evt_1", Some("2026-02-18T08:31"), Some(1.0), "admin")
        .await
        .unwrap();

    assert_eq!(to_iso(entry.requested_start_at), "2026-02-18T07:31:00.000Z");
    assert_eq!(
        scheduler.normalizer().to_local_input(entry.requested_start_at),
        "2026-02-18T08:31"
    );
}

#[tokio::test]
async fn test_offset_qualified_start_is_taken_as_is() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());

    let entry = scheduler
        .schedule("evt_1", Some("2026-07-15T14:45:00.000Z"), None, "admin")
        .await
        .unwrap();

    assert_eq!(to_iso(entry.requested_start_at), "2026-07-15T14:45:00.000Z");
    let local = scheduler.normalizer().to_local_input(entry.requested_start_at);
    assert_eq!(local, "2026-07-15T16:45");
    assert_eq!(
        scheduler.normalizer().parse(&local).unwrap(),
        entry.requested_start_at
    );
}

#[tokio::test]
async fn test_cancel_unknown_id_is_a_noop() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());

    assert!(!scheduler.cancel(&EntryId::new()).await.unwrap());
    assert_eq!(scheduler.storage().recompute_calls(), 0);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());
    let entry = scheduler
        .schedule("evt_1", None, None, "admin")
        .await
        .unwrap();

    assert!(scheduler.cancel(&entry.id).await.unwrap());
    assert!(!scheduler.cancel(&entry.id).await.unwrap());
}

#[tokio::test]
async fn test_clear_queue_and_history_with_mixed_statuses() {
    let (scheduler, clock) = scheduler_at(summer_noon(), SlotConfig::default());

    let done = scheduler
        .schedule("evt_done", None, Some(1.0), "admin")
        .await
        .unwrap();
    let dropped = scheduler
        .schedule("evt_dropped", Some("2026-07-01T10:00"), None, "admin")
        .await
        .unwrap();
    scheduler
        .schedule("evt_waiting", Some("2026-07-02T10:00"), None, "admin")
        .await
        .unwrap();
    scheduler.cancel(&dropped.id).await.unwrap();

    clock.advance(TimeDelta::hours(2));
    let completed = scheduler
        .list(Some(EntryStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed[0].id, done.id);

    assert_eq!(scheduler.clear_queue_and_history().await.unwrap(), 3);
    assert!(scheduler.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_queue_keeps_history() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());
    let first = scheduler
        .schedule("evt_1", None, None, "admin")
        .await
        .unwrap();
    scheduler
        .schedule("evt_2", None, None, "admin")
        .await
        .unwrap();
    scheduler.cancel(&first.id).await.unwrap();

    assert_eq!(scheduler.clear_queue_only().await.unwrap(), 1);

    let remaining = scheduler.list(None).await.unwrap();
    assert_eq!(keys(&remaining), ["evt_1"]);
    assert_eq!(remaining[0].status, EntryStatus::Cancelled);
}

#[tokio::test]
async fn test_windows_match_durations_after_every_mutation() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());
    let a = scheduler
        .schedule("evt_a", Some("2026-06-25T09:00"), Some(3.0), "admin")
        .await
        .unwrap();
    let b = scheduler
        .schedule("evt_b", Some("2026-10-25T02:30"), Some(30.0), "admin")
        .await
        .unwrap();
    scheduler
        .schedule("evt_c", None, Some(-4.0), "admin")
        .await
        .unwrap();
    scheduler
        .reschedule(&a.id, "2026-03-29T02:30", Some(999.0))
        .await
        .unwrap();
    scheduler.cancel(&b.id).await.unwrap();

    for entry in scheduler.list(Some(EntryStatus::Scheduled)).await.unwrap() {
        assert!((1..=168).contains(&entry.duration_hours));
        assert_eq!(entry.effective_start_at, entry.requested_start_at);
        assert_eq!(
            entry.effective_end_at - entry.effective_start_at,
            TimeDelta::hours(i64::from(entry.duration_hours))
        );
    }
}

#[tokio::test]
async fn test_reschedule_cancelled_entry_is_refused() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());
    let entry = scheduler
        .schedule("evt_1", None, None, "admin")
        .await
        .unwrap();
    scheduler.cancel(&entry.id).await.unwrap();

    let updated = scheduler
        .reschedule(&entry.id, "2026-08-01T10:00", Some(2.0))
        .await
        .unwrap();
    assert!(!updated);

    let stored = &scheduler.list(None).await.unwrap()[0];
    assert_eq!(stored.status, EntryStatus::Cancelled);
    assert_eq!(stored.requested_start_at, entry.requested_start_at);
}

#[tokio::test]
async fn test_malformed_start_names_accepted_formats() {
    let (scheduler, _) = scheduler_at(summer_noon(), SlotConfig::default());

    let err = scheduler
        .schedule("evt_1", Some("21/06/2026 18:00"), None, "admin")
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::InvalidInput(_)));
    assert!(err.to_string().contains("YYYY-MM-DDTHH:mm"));
}

#[tokio::test]
async fn test_configured_default_duration_applies() {
    let config = SlotConfig::default().with_default_duration_hours(6);
    let (scheduler, _) = scheduler_at(summer_noon(), config);

    let entry = scheduler
        .schedule("evt_1", None, Some(f64::NAN), "admin")
        .await
        .unwrap();
    assert_eq!(entry.duration_hours, 6);
}
