//! Batch, station, worker and alert records as seen by operators.

use shared::{
    domain::{Alert, Batch, BatchId, Station, StationId, StationStatus, Worker},
    error::{ApiError, ErrorCode},
    protocol::{BatchProgressResponse, CreateBatchRequest, ProgressView, StationStatusResponse},
};
use storage::{is_unique_violation, NewBatch, Query};
use tracing::info;

use crate::{internal, ApiContext};

pub async fn create_batch(ctx: &ApiContext, req: CreateBatchRequest) -> Result<Batch, ApiError> {
    let batch_number = req.batch_number.trim().to_string();
    if batch_number.is_empty() {
        return Err(ApiError::validation("batch_number must not be empty"));
    }
    if !req.target_quantity_kg.is_finite() || req.target_quantity_kg <= 0.0 {
        return Err(ApiError::validation("target_quantity_kg must be positive"));
    }
    if !req.raw_material_kg.is_finite() || req.raw_material_kg < 0.0 {
        return Err(ApiError::validation("raw_material_kg must not be negative"));
    }
    if req.end_date < req.start_date {
        return Err(ApiError::validation("end_date must not precede start_date"));
    }

    let store = ctx.store();
    let existing = store
        .batches(Query::all().eq("batch_number", batch_number.as_str()).limit(1))
        .await
        .map_err(internal)?;
    if !existing.is_empty() {
        return Err(batch_exists());
    }

    let batch = store
        .create_batch(NewBatch {
            batch_number,
            product_name: req.product_name,
            start_date: req.start_date,
            end_date: req.end_date,
            target_quantity_kg: req.target_quantity_kg,
            raw_material_kg: req.raw_material_kg,
        })
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                batch_exists()
            } else {
                internal(err)
            }
        })?;
    info!(batch_number = %batch.batch_number, batch_id = batch.id.0, "batch created");
    Ok(batch)
}

fn batch_exists() -> ApiError {
    ApiError::new(ErrorCode::Conflict, "Batch number already exists")
}

pub async fn list_batches(ctx: &ApiContext) -> Result<Vec<Batch>, ApiError> {
    ctx.store()
        .batches(Query::all().order_desc("created_at"))
        .await
        .map_err(internal)
}

pub async fn get_batch(ctx: &ApiContext, batch_id: BatchId) -> Result<Batch, ApiError> {
    ctx.store()
        .batches(Query::all().eq("id", batch_id).limit(1))
        .await
        .map_err(internal)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Batch not found"))
}

pub async fn batch_progress(
    ctx: &ApiContext,
    batch_id: BatchId,
) -> Result<BatchProgressResponse, ApiError> {
    let batch = get_batch(ctx, batch_id).await?;
    let progress = ctx
        .store()
        .progress(Query::all().eq("batch_id", batch_id).order_asc("station_id"))
        .await
        .map_err(internal)?;
    let stations = list_stations(ctx).await?;

    let progress = progress
        .into_iter()
        .map(|record| {
            let station_name = station_name(&stations, record.station_id);
            ProgressView {
                progress: record,
                station_name,
            }
        })
        .collect();
    Ok(BatchProgressResponse { batch, progress })
}

pub async fn list_stations(ctx: &ApiContext) -> Result<Vec<Station>, ApiError> {
    ctx.store()
        .stations(Query::all().order_asc("station_id"))
        .await
        .map_err(internal)
}

pub async fn get_station(ctx: &ApiContext, station_id: StationId) -> Result<Station, ApiError> {
    ctx.store()
        .stations(Query::all().eq("station_id", station_id))
        .await
        .map_err(internal)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Station not found"))
}

pub async fn station_workers(
    ctx: &ApiContext,
    station_id: StationId,
) -> Result<Vec<Worker>, ApiError> {
    ctx.store()
        .workers(
            Query::all()
                .eq("station_id", station_id)
                .eq("is_active", true),
        )
        .await
        .map_err(internal)
}

/// Manual override of a station's status.
pub async fn update_station_status(
    ctx: &ApiContext,
    station_id: StationId,
    status: StationStatus,
) -> Result<StationStatusResponse, ApiError> {
    let updated = ctx
        .processor
        .set_station_status(station_id, status)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(ApiError::not_found("Station not found"));
    }
    info!(station_id = %station_id, status = %status, "station status overridden");
    Ok(StationStatusResponse {
        message: "Station status updated".to_string(),
        station_id,
        status,
    })
}

pub async fn list_workers(ctx: &ApiContext) -> Result<Vec<Worker>, ApiError> {
    ctx.store().workers(Query::all()).await.map_err(internal)
}

pub async fn get_worker(ctx: &ApiContext, worker_id: &str) -> Result<Worker, ApiError> {
    ctx.store()
        .workers(Query::all().eq("worker_id", worker_id).limit(1))
        .await
        .map_err(internal)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Worker not found"))
}

pub async fn list_alerts(ctx: &ApiContext, unresolved_only: bool) -> Result<Vec<Alert>, ApiError> {
    let mut query = Query::all().order_desc("created_at");
    if unresolved_only {
        query = query.eq("is_resolved", false);
    }
    ctx.store().alerts(query).await.map_err(internal)
}

pub(crate) fn station_name(stations: &[Station], station_id: StationId) -> String {
    stations
        .iter()
        .find(|station| station.station_id == station_id)
        .map(|station| station.station_name.clone())
        .unwrap_or_else(|| station_id.display_name().to_string())
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
