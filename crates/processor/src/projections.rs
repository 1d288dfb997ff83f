//! Read-only aggregations over stored floor state.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use shared::{
    domain::{round_kg, BatchStatus, StationId, StationStatus, Worker},
    error::ApiError,
    protocol::{
        CostAnalysis, FloorStatistics, OwnerDashboard, ProductionStats, ProductivityReport,
        StationProductivity, StationWastage, TimelineEntry,
    },
};
use storage::Query;

use crate::{catalog, internal, ApiContext};

const DASHBOARD_ALERT_LIMIT: u32 = 10;

pub async fn owner_dashboard(ctx: &ApiContext) -> Result<OwnerDashboard, ApiError> {
    let store = ctx.store();
    let stations = catalog::list_stations(ctx).await?;
    let batches = store
        .batches(Query::all().eq("overall_status", BatchStatus::InProgress))
        .await
        .map_err(internal)?;
    let alerts = store
        .alerts(
            Query::all()
                .eq("is_resolved", false)
                .order_desc("created_at")
                .limit(DASHBOARD_ALERT_LIMIT),
        )
        .await
        .map_err(internal)?;
    let workers = active_workers(ctx).await?;

    let count_status = |status: StationStatus| {
        stations
            .iter()
            .filter(|station| station.current_status == status)
            .count()
    };
    let statistics = FloorStatistics {
        total_workers: workers.len(),
        active_stations: count_status(StationStatus::Active),
        delayed_stations: count_status(StationStatus::Delayed),
        total_batches: batches.len(),
    };

    Ok(OwnerDashboard {
        stations,
        batches,
        alerts,
        workers,
        statistics,
    })
}

pub async fn production_stats(ctx: &ApiContext) -> Result<ProductionStats, ApiError> {
    let today = Utc::now().date_naive();
    let batches_today = ctx
        .store()
        .batches(Query::all().gte("start_date", today))
        .await
        .map_err(internal)?;
    let completed_today = batches_today
        .iter()
        .filter(|batch| batch.overall_status == BatchStatus::Completed)
        .count();

    let workers = active_workers(ctx).await?;
    Ok(ProductionStats {
        batches_today: batches_today.len(),
        completed_today,
        average_productivity: round2(average_score(&workers)),
    })
}

pub async fn productivity(ctx: &ApiContext) -> Result<ProductivityReport, ApiError> {
    let workers = active_workers(ctx).await?;

    let mut by_station: BTreeMap<StationId, Vec<Worker>> = BTreeMap::new();
    for worker in &workers {
        by_station
            .entry(worker.station_id)
            .or_default()
            .push(worker.clone());
    }
    let station_productivity = by_station
        .into_iter()
        .map(|(station, members)| {
            let summary = StationProductivity {
                average_score: round2(average_score(&members)),
                total_tasks: members.iter().map(|w| w.total_tasks_completed).sum(),
                workers: members,
            };
            (station, summary)
        })
        .collect();

    Ok(ProductivityReport {
        workers,
        station_productivity,
    })
}

/// Wastage totals per station across every progress record.
pub async fn wastage(ctx: &ApiContext) -> Result<BTreeMap<StationId, StationWastage>, ApiError> {
    let progress = ctx
        .store()
        .progress(Query::all())
        .await
        .map_err(internal)?;

    let mut report: BTreeMap<StationId, StationWastage> = BTreeMap::new();
    for record in progress {
        let entry = report.entry(record.station_id).or_default();
        entry.total_wastage += record.wastage_kg.unwrap_or(0.0);
        entry.count += 1;
    }
    for entry in report.values_mut() {
        entry.total_wastage = round_kg(entry.total_wastage);
        if entry.count > 0 {
            entry.average_wastage = round_kg(entry.total_wastage / entry.count as f64);
        }
    }
    Ok(report)
}

/// Progress records joined with batch number and station name. An unknown
/// batch number falls back to the whole floor.
pub async fn timeline(
    ctx: &ApiContext,
    batch_number: Option<&str>,
) -> Result<Vec<TimelineEntry>, ApiError> {
    let store = ctx.store();
    let batches = store.batches(Query::all()).await.map_err(internal)?;
    let numbers: HashMap<_, _> = batches
        .iter()
        .map(|batch| (batch.id, batch.batch_number.clone()))
        .collect();

    let mut query = Query::all();
    if let Some(number) = batch_number {
        if let Some(batch) = batches.iter().find(|batch| batch.batch_number == number) {
            query = query.eq("batch_id", batch.id);
        }
    }
    let progress = store.progress(query).await.map_err(internal)?;
    let stations = catalog::list_stations(ctx).await?;

    Ok(progress
        .into_iter()
        .map(|record| TimelineEntry {
            batch_number: numbers.get(&record.batch_id).cloned(),
            station_name: catalog::station_name(&stations, record.station_id),
            progress: record,
        })
        .collect())
}

pub async fn costs(ctx: &ApiContext) -> Result<CostAnalysis, ApiError> {
    let store = ctx.store();
    let progress = store.progress(Query::all()).await.map_err(internal)?;
    let batches = store.batches(Query::all()).await.map_err(internal)?;

    let wastage_kg = round_kg(progress.iter().filter_map(|p| p.wastage_kg).sum());
    let raw_material_kg = round_kg(batches.iter().map(|b| b.raw_material_kg).sum());
    let wastage_cost = round2(wastage_kg * ctx.wastage_cost_per_kg);

    Ok(CostAnalysis {
        raw_material_kg,
        wastage_kg,
        wastage_cost,
        total_cost: wastage_cost,
    })
}

async fn active_workers(ctx: &ApiContext) -> Result<Vec<Worker>, ApiError> {
    ctx.store()
        .workers(Query::all().eq("is_active", true))
        .await
        .map_err(internal)
}

fn average_score(workers: &[Worker]) -> f64 {
    if workers.is_empty() {
        return 0.0;
    }
    workers.iter().map(|w| w.productivity_score).sum::<f64>() / workers.len() as f64
}

/// Scores and money are reported to the cent.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "tests/projections_tests.rs"]
mod tests;
