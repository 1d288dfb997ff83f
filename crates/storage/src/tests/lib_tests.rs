use super::*;
use chrono::{NaiveDate, Utc};
use shared::domain::{
    ActivityType, AlertSeverity, AlertType, BatchId, BatchStatus, CommandAction, ProgressStatus,
    StationId, StationStatus,
};

fn new_batch(number: &str) -> NewBatch {
    let day = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
    NewBatch {
        batch_number: number.to_string(),
        product_name: "ABC Powder".to_string(),
        start_date: day,
        end_date: day,
        target_quantity_kg: 200.0,
        raw_material_kg: 270.0,
    }
}

async fn memory_store() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = memory_store().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("floor.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.pool().close().await;

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn migration_seeds_station_catalog() {
    let storage = memory_store().await;
    let stations = storage
        .stations(Query::all().order_asc("station_id"))
        .await
        .expect("stations");
    assert_eq!(stations.len(), 8);
    for (station, expected) in stations.iter().zip(StationId::ALL) {
        assert_eq!(station.station_id, *expected);
        assert_eq!(station.station_name, expected.display_name());
        assert_eq!(station.capacity, 100);
        assert_eq!(station.current_status, StationStatus::Idle);
    }
}

#[tokio::test]
async fn create_batch_adds_pending_progress_for_every_station() {
    let storage = memory_store().await;
    let batch = storage.create_batch(new_batch("BATCH_010")).await.expect("batch");
    assert_eq!(batch.current_station, StationId::Station1);
    assert_eq!(batch.overall_status, BatchStatus::NotStarted);
    assert_eq!(batch.current_quantity_kg, 0.0);

    let progress = storage
        .progress(Query::all().eq("batch_id", batch.id).order_asc("station_id"))
        .await
        .expect("progress");
    assert_eq!(progress.len(), 8);
    for record in &progress {
        assert_eq!(record.status, ProgressStatus::Pending);
        assert!(record.start_time.is_none());
        assert!(record.end_time.is_none());
        assert!(record.input_quantity_kg.is_none());
    }
}

#[tokio::test]
async fn duplicate_batch_number_is_a_unique_violation() {
    let storage = memory_store().await;
    storage.create_batch(new_batch("BATCH_011")).await.expect("first");
    let err = storage
        .create_batch(new_batch("BATCH_011"))
        .await
        .expect_err("duplicate");
    assert!(is_unique_violation(&err));
    assert!(!is_transient(&err));

    let batches = storage
        .batches(Query::all().eq("batch_number", "BATCH_011"))
        .await
        .expect("batches");
    assert_eq!(batches.len(), 1);
}

#[tokio::test]
async fn update_returns_matched_records_only() {
    let storage = memory_store().await;
    let batch = storage.create_batch(new_batch("BATCH_012")).await.expect("batch");
    let now = Utc::now();

    let updated = storage
        .update_progress(
            Filter::new()
                .eq("batch_id", batch.id)
                .eq("station_id", StationId::Station3),
            ProgressPatch {
                status: Some(ProgressStatus::InProgress),
                start_time: Some(now),
                input_quantity_kg: Some(200.0),
                workers_assigned: Some(1),
                ..ProgressPatch::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].station_id, StationId::Station3);
    assert_eq!(updated[0].status, ProgressStatus::InProgress);
    assert_eq!(updated[0].input_quantity_kg, Some(200.0));

    let none = storage
        .update_progress(
            Filter::new().eq("batch_id", BatchId(9_999)),
            ProgressPatch {
                status: Some(ProgressStatus::Completed),
                ..ProgressPatch::default()
            },
        )
        .await
        .expect("update nothing");
    assert!(none.is_empty());
}

#[tokio::test]
async fn reopen_clears_completion_fields() {
    let storage = memory_store().await;
    let batch = storage.create_batch(new_batch("BATCH_013")).await.expect("batch");
    let key = Filter::new()
        .eq("batch_id", batch.id)
        .eq("station_id", StationId::Station1);

    storage
        .update_progress(
            key.clone(),
            ProgressPatch {
                status: Some(ProgressStatus::Completed),
                start_time: Some(Utc::now()),
                end_time: Some(Utc::now()),
                input_quantity_kg: Some(100.0),
                output_quantity_kg: Some(92.0),
                wastage_kg: Some(8.0),
                ..ProgressPatch::default()
            },
        )
        .await
        .expect("complete");

    let reopened = storage
        .update_progress(
            key,
            ProgressPatch {
                status: Some(ProgressStatus::InProgress),
                reopen: true,
                ..ProgressPatch::default()
            },
        )
        .await
        .expect("reopen");
    assert_eq!(reopened[0].status, ProgressStatus::InProgress);
    assert!(reopened[0].end_time.is_none());
    assert!(reopened[0].output_quantity_kg.is_none());
    assert!(reopened[0].wastage_kg.is_none());
    assert!(reopened[0].start_time.is_some());
}

#[tokio::test]
async fn empty_patch_reads_matching_records() {
    let storage = memory_store().await;
    let stations = storage
        .update_stations(
            Filter::new().eq("station_id", StationId::Station4),
            StationPatch::default(),
        )
        .await
        .expect("noop update");
    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].current_status, StationStatus::Idle);
}

#[tokio::test]
async fn filters_support_membership_null_and_ordering() {
    let storage = memory_store().await;
    storage
        .update_stations(
            Filter::new().in_("station_id", [StationId::Station2, StationId::Station5]),
            StationPatch::status(StationStatus::Active),
        )
        .await
        .expect("update");

    let active = storage
        .stations(Query::all().eq("current_status", StationStatus::Active))
        .await
        .expect("active");
    let ids: Vec<_> = active.iter().map(|s| s.station_id).collect();
    assert_eq!(ids, vec![StationId::Station2, StationId::Station5]);

    let none = storage
        .stations(Query::all().in_("station_id", Vec::<StationId>::new()))
        .await
        .expect("empty membership");
    assert!(none.is_empty());

    let batch = storage.create_batch(new_batch("BATCH_014")).await.expect("batch");
    let unstarted = storage
        .progress(
            Query::all()
                .eq("batch_id", batch.id)
                .eq("start_time", FieldValue::Null),
        )
        .await
        .expect("null filter");
    assert_eq!(unstarted.len(), 8);

    let last_two = storage
        .progress(
            Query::all()
                .eq("batch_id", batch.id)
                .order_desc("station_id")
                .limit(2),
        )
        .await
        .expect("ordered");
    assert_eq!(last_two[0].station_id, StationId::Station8);
    assert_eq!(last_two[1].station_id, StationId::Station7);
}

#[tokio::test]
async fn gte_filter_compares_quantities() {
    let storage = memory_store().await;
    let mut small = new_batch("BATCH_015");
    small.target_quantity_kg = 50.0;
    storage.create_batch(small).await.expect("small");
    storage.create_batch(new_batch("BATCH_016")).await.expect("large");

    let large = storage
        .batches(Query::all().gte("target_quantity_kg", 100.0))
        .await
        .expect("gte");
    assert_eq!(large.len(), 1);
    assert_eq!(large[0].batch_number, "BATCH_016");
}

#[tokio::test]
async fn unknown_field_is_rejected() {
    let storage = memory_store().await;
    let err = storage
        .batches(Query::all().eq("owner", "nobody"))
        .await
        .expect_err("unknown field");
    assert!(err.to_string().contains("unknown field 'owner'"));
    assert!(!is_transient(&err));
}

#[tokio::test]
async fn credit_task_completed_increments_counter() {
    let storage = memory_store().await;
    storage
        .insert_worker(NewWorker {
            worker_id: "WORKER_101".to_string(),
            worker_name: "Ravi".to_string(),
            station_id: StationId::Station1,
            productivity_score: 60.0,
            total_tasks_completed: 4,
        })
        .await
        .expect("worker");

    let credited = storage
        .credit_task_completed("WORKER_101")
        .await
        .expect("credit")
        .expect("worker exists");
    assert_eq!(credited.total_tasks_completed, 5);

    let missing = storage
        .credit_task_completed("WORKER_999")
        .await
        .expect("credit unknown");
    assert!(missing.is_none());
}

#[tokio::test]
async fn command_log_processed_flag_flips() {
    let storage = memory_store().await;
    let log = storage
        .insert_command_log(NewCommandLog {
            worker_id: "WORKER_201".to_string(),
            station_id: StationId::Station2,
            raw_command: "Starting washing batch 5".to_string(),
            parsed_action: Some(CommandAction::Starting),
            parsed_entity: Some("washing".to_string()),
            batch_number: Some("5".to_string()),
        })
        .await
        .expect("log");
    assert!(!log.processed);

    let updated = storage
        .update_command_logs(
            Filter::new().eq("id", log.id),
            CommandLogPatch {
                processed: Some(true),
            },
        )
        .await
        .expect("mark");
    assert!(updated[0].processed);
    assert_eq!(updated[0].parsed_action, Some(CommandAction::Starting));

    let recent = storage
        .command_logs(Query::all().order_desc("timestamp").limit(10))
        .await
        .expect("recent");
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn alerts_and_activity_round_trip_enums() {
    let storage = memory_store().await;
    let batch = storage.create_batch(new_batch("BATCH_017")).await.expect("batch");
    let alert = storage
        .insert_alert(NewAlert {
            alert_type: AlertType::MachineFailure,
            severity: AlertSeverity::High,
            station_id: StationId::Station5,
            batch_id: Some(batch.id),
            message: "Machine stopped at Drying (Tunnel Dryer) - reported by WORKER_501".into(),
        })
        .await
        .expect("alert");
    assert_eq!(alert.batch_id, Some(batch.id));
    assert!(!alert.is_resolved);

    let unresolved = storage
        .alerts(Query::all().eq("is_resolved", false))
        .await
        .expect("alerts");
    assert_eq!(unresolved.len(), 1);

    storage
        .insert_activity(NewActivity {
            worker_id: "WORKER_501".to_string(),
            station_id: StationId::Station5,
            activity_type: ActivityType::MachineIssue,
            description: "Machine stopped at drying".to_string(),
            batch_number: None,
        })
        .await
        .expect("activity");
    let activity = storage
        .activities(Query::all().eq("worker_id", "WORKER_501"))
        .await
        .expect("activities");
    assert_eq!(activity[0].activity_type, ActivityType::MachineIssue);
}

#[tokio::test]
async fn demo_seed_runs_once() {
    let storage = memory_store().await;
    let first = seed_demo_floor(&storage).await.expect("seed");
    assert_eq!(first.workers_created, 55);
    assert!(first.batch_created);

    let second = seed_demo_floor(&storage).await.expect("seed again");
    assert_eq!(second, SeedSummary::default());

    let drying = storage
        .workers(Query::all().eq("station_id", StationId::Station5))
        .await
        .expect("workers");
    assert_eq!(drying.len(), 10);
    assert_eq!(drying[0].worker_id, "WORKER_501");
    assert_eq!(drying[9].worker_id, "WORKER_510");
}

#[test]
fn sqlite_path_skips_memory_and_foreign_urls() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert!(sqlite_path("postgres://localhost/db").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/floor.db?mode=rwc"),
        Some(PathBuf::from("./data/floor.db"))
    );
}
