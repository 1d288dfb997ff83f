//! Entry points for reports arriving from the floor.

use shared::{
    domain::{StationId, VoiceCommandLog},
    error::ApiError,
    protocol::{LocationUpdateResponse, SubmitCommandRequest, SubmitCommandResponse},
};
use storage::{Filter, Query, WorkerPatch};
use tracing::{info, warn};

use crate::{internal, retry::with_retry, ApiContext, FloorCommand};

pub const DEFAULT_RECENT_LIMIT: u32 = 50;
pub const MAX_RECENT_LIMIT: u32 = 500;

/// Accepts a worker report. Store trouble never turns into an error here;
/// only a missing worker id is rejected.
pub async fn submit_command(
    ctx: &ApiContext,
    req: SubmitCommandRequest,
) -> Result<SubmitCommandResponse, ApiError> {
    if req.worker_id.trim().is_empty() {
        return Err(ApiError::validation("worker_id must not be empty"));
    }

    let store = ctx.store();
    let lookup_id = req.worker_id.clone();
    let known = with_retry(ctx.processor.retry_policy(), "lookup_worker", move || {
        store.workers(Query::all().eq("worker_id", lookup_id.clone()).limit(1))
    })
    .await;
    if matches!(known.as_deref(), Some([])) {
        warn!(
            worker_id = %req.worker_id,
            station_id = %req.station_id,
            "command from unregistered worker"
        );
    }

    let worker_id = req.worker_id.clone();
    let station_id = req.station_id;
    let result = ctx.processor.process(FloorCommand::from(req)).await;

    Ok(SubmitCommandResponse {
        message: "Voice command processed".to_string(),
        parsed: result.intent,
        worker_id,
        station_id,
        steps: result.steps,
    })
}

/// Moves a worker to another station. Unknown workers are a not-found error;
/// a failed write is still acknowledged.
pub async fn update_worker_location(
    ctx: &ApiContext,
    worker_id: &str,
    station_id: StationId,
) -> Result<LocationUpdateResponse, ApiError> {
    let policy = ctx.processor.retry_policy();
    let store = ctx.store();

    let existing = with_retry(policy, "lookup_worker", move || {
        store.workers(Query::all().eq("worker_id", worker_id).limit(1))
    })
    .await;
    if existing.map_or(true, |rows| rows.is_empty()) {
        return Err(ApiError::not_found("Worker not found"));
    }

    let updated = with_retry(policy, "relocate_worker", move || {
        store.update_workers(
            Filter::new().eq("worker_id", worker_id),
            WorkerPatch {
                station_id: Some(station_id),
                ..WorkerPatch::default()
            },
        )
    })
    .await;

    let message = match updated {
        Some(rows) if !rows.is_empty() => {
            info!(worker_id, station_id = %station_id, "worker relocated");
            "Worker location updated"
        }
        _ => {
            warn!(worker_id, station_id = %station_id, "worker relocation not stored");
            "Worker location update attempted"
        }
    };

    Ok(LocationUpdateResponse {
        message: message.to_string(),
        worker_id: worker_id.to_string(),
        station_id,
    })
}

/// Newest command log entries first.
pub async fn list_recent_commands(
    ctx: &ApiContext,
    limit: Option<u32>,
) -> Result<Vec<VoiceCommandLog>, ApiError> {
    let limit = limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    ctx.store()
        .command_logs(Query::all().order_desc("timestamp").limit(limit))
        .await
        .map_err(internal)
}

#[cfg(test)]
#[path = "tests/ingest_tests.rs"]
mod tests;
