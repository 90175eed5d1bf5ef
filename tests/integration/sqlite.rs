//! SQLite backend integration tests.
//!
//! Run the scheduler against on-disk databases, including two schedulers
//! sharing one file the way two server processes would.

use chrono::TimeDelta;
use spotlight::testing::ManualClock;
use spotlight::{
    EntryStatus, GlobalConfig, SchedulerError, SlotConfig, SlotScheduler, SqliteStorage, Storage,
    StorageConfig, open_storage, to_iso,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::summer_noon;

#[tokio::test]
async fn test_entries_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("slots.db");

    let id = {
        let scheduler =
            SlotScheduler::new(SqliteStorage::new(&db_path).await.unwrap(), SlotConfig::default());
        let entry = scheduler
            .schedule("evt_1", Some("2026-06-21T18:00"), Some(48.0), "admin")
            .await
            .unwrap();
        scheduler.storage().close().await;
        entry.id
    };

    let scheduler =
        SlotScheduler::new(SqliteStorage::new(&db_path).await.unwrap(), SlotConfig::default());
    let entries = scheduler.list(None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, id);
    assert_eq!(to_iso(entries[0].effective_end_at), "2026-06-23T16:00:00.000Z");
}

#[tokio::test]
async fn test_schedule_returns_the_stored_entry() {
    let scheduler =
        SlotScheduler::new(SqliteStorage::in_memory().await.unwrap(), SlotConfig::default());

    let now_entry = scheduler
        .schedule("evt_now", None, Some(3.0), "admin")
        .await
        .unwrap();
    let precise_entry = scheduler
        .schedule("evt_precise", Some("2099-07-15T14:45:00.0005Z"), None, "admin")
        .await
        .unwrap();

    let stored = scheduler.list(None).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.contains(&now_entry));
    assert!(stored.contains(&precise_entry));
    assert_eq!(
        to_iso(precise_entry.requested_start_at),
        "2099-07-15T14:45:00.000Z"
    );
}

#[tokio::test]
async fn test_sqlite_lifecycle_with_manual_clock() {
    let clock = Arc::new(ManualClock::new(summer_noon()));
    let scheduler = SlotScheduler::new(SqliteStorage::in_memory().await.unwrap(), SlotConfig::default())
        .with_clock(clock.clone());

    let short = scheduler
        .schedule("evt_short", None, Some(1.0), "admin")
        .await
        .unwrap();
    let long = scheduler
        .schedule("evt_long", None, Some(24.0), "admin")
        .await
        .unwrap();
    assert!(scheduler.cancel(&long.id).await.unwrap());
    assert!(!scheduler.cancel(&long.id).await.unwrap());

    clock.advance(TimeDelta::hours(2));
    let projection = scheduler.projection().await.unwrap();
    assert!(projection.active.is_empty());
    assert_eq!(projection.recent_ended.len(), 1);
    assert_eq!(projection.recent_ended[0].id, short.id);

    let completed = scheduler
        .list(Some(EntryStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);

    assert_eq!(scheduler.clear_history_only().await.unwrap(), 2);
    assert!(scheduler.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_two_processes_share_one_lock() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("slots.db");

    let holder = SqliteStorage::open(&db_path, Duration::from_millis(50))
        .await
        .unwrap();
    let other = SlotScheduler::new(
        SqliteStorage::open(&db_path, Duration::from_millis(50))
            .await
            .unwrap(),
        SlotConfig::default(),
    );

    let session = holder.locked_session().await.unwrap();
    let err = other
        .schedule("evt_1", None, None, "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Unavailable(_)));

    session.commit().await.unwrap();
    other
        .schedule("evt_1", None, None, "admin")
        .await
        .unwrap();
    assert_eq!(other.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_open_storage_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("configured.db");
    let config = GlobalConfig {
        storage: Some(StorageConfig::Sqlite {
            path: db_path.to_string_lossy().into_owned(),
            busy_timeout_ms: Some(100),
        }),
        ..GlobalConfig::default()
    };

    let storage = open_storage(&config).await.unwrap();
    let scheduler = SlotScheduler::with_storage(storage, config.slots.clone());
    scheduler
        .schedule("evt_1", None, None, "admin")
        .await
        .unwrap();

    assert!(db_path.exists());
    assert_eq!(scheduler.list(None).await.unwrap().len(), 1);
}
