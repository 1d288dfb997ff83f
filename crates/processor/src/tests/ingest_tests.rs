use std::sync::Arc;

use super::*;
use crate::test_support::{context, seeded_storage, Failure, FlakyStore};
use shared::{domain::CommandAction, error::ErrorCode, protocol::Step};

fn request(worker_id: &str, station_id: StationId, raw_command: &str) -> SubmitCommandRequest {
    SubmitCommandRequest {
        worker_id: worker_id.to_string(),
        station_id,
        raw_command: raw_command.to_string(),
        batch_number: None,
    }
}

#[tokio::test]
async fn submit_returns_parsed_intent_and_steps() {
    let ctx = context(Arc::new(seeded_storage().await));
    let response = submit_command(
        &ctx,
        request("WORKER_201", StationId::Station2, "Starting washing batch 001"),
    )
    .await
    .expect("submit");

    assert_eq!(response.message, "Voice command processed");
    assert_eq!(response.worker_id, "WORKER_201");
    assert_eq!(response.station_id, StationId::Station2);
    assert_eq!(response.parsed.action, Some(CommandAction::Starting));
    assert_eq!(response.parsed.entity.as_deref(), Some("washing"));
    assert_eq!(response.parsed.batch_number.as_deref(), Some("001"));
    assert!(response
        .steps
        .iter()
        .any(|report| report.step == Step::StartProgress));
}

#[tokio::test]
async fn submit_rejects_blank_worker() {
    let ctx = context(Arc::new(seeded_storage().await));
    let err = submit_command(&ctx, request("  ", StationId::Station1, "Starting"))
        .await
        .expect_err("blank worker");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn submit_accepts_unregistered_worker() {
    let ctx = context(Arc::new(seeded_storage().await));
    let response = submit_command(
        &ctx,
        request("VISITOR_1", StationId::Station3, "Blanching finished"),
    )
    .await
    .expect("submit");
    assert_eq!(response.parsed.action, Some(CommandAction::Completed));

    let logs = ctx.store().command_logs(Query::all()).await.expect("logs");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].worker_id, "VISITOR_1");
}

#[tokio::test]
async fn submit_survives_store_outage() {
    let flaky = FlakyStore::new(seeded_storage().await);
    for op in [
        "workers",
        "insert_command_log",
        "batches",
        "insert_activity",
        "update_stations",
    ] {
        flaky.fail(op, u32::MAX, Failure::Transient);
    }
    let ctx = context(Arc::new(flaky));

    let response = submit_command(
        &ctx,
        request("WORKER_201", StationId::Station2, "Starting washing batch 1"),
    )
    .await
    .expect("outage is not an error");
    assert!(response.steps.iter().any(|r| r.outcome.is_failure()));
}

#[tokio::test]
async fn relocating_known_worker_updates_station() {
    let ctx = context(Arc::new(seeded_storage().await));
    let response = update_worker_location(&ctx, "WORKER_101", StationId::Station4)
        .await
        .expect("relocate");
    assert_eq!(response.message, "Worker location updated");
    assert_eq!(response.station_id, StationId::Station4);

    let worker = ctx
        .store()
        .workers(Query::all().eq("worker_id", "WORKER_101"))
        .await
        .expect("workers");
    assert_eq!(worker[0].station_id, StationId::Station4);
}

#[tokio::test]
async fn relocating_unknown_worker_is_not_found() {
    let ctx = context(Arc::new(seeded_storage().await));
    let err = update_worker_location(&ctx, "WORKER_999", StationId::Station4)
        .await
        .expect_err("unknown");
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.message, "Worker not found");
}

#[tokio::test]
async fn failed_relocation_is_still_acknowledged() {
    let flaky = FlakyStore::new(seeded_storage().await);
    flaky.fail("update_workers", u32::MAX, Failure::Permanent);
    let ctx = context(Arc::new(flaky));

    let response = update_worker_location(&ctx, "WORKER_101", StationId::Station4)
        .await
        .expect("acknowledged");
    assert_eq!(response.message, "Worker location update attempted");
}

#[tokio::test]
async fn recent_commands_are_newest_first_and_clamped() {
    let ctx = context(Arc::new(seeded_storage().await));
    for text in ["Starting receiving", "Receiving done", "Tea break"] {
        submit_command(&ctx, request("WORKER_101", StationId::Station1, text))
            .await
            .expect("submit");
    }

    let recent = list_recent_commands(&ctx, None).await.expect("recent");
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].raw_command, "Tea break");
    assert!(recent.iter().all(|entry| entry.processed));

    let one = list_recent_commands(&ctx, Some(0)).await.expect("clamped");
    assert_eq!(one.len(), 1);
}
