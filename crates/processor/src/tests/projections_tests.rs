use std::sync::Arc;

use super::*;
use crate::test_support::{batch_by_number, command, context, seeded_storage};
use storage::Storage;

async fn run(ctx: &ApiContext, worker: &str, station: StationId, texts: &[&str]) {
    for text in texts {
        ctx.processor
            .process(command(worker, station, text, Some("BATCH_001")))
            .await;
    }
}

async fn empty_context() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    context(Arc::new(storage))
}

#[tokio::test]
async fn dashboard_counts_active_floor() {
    let ctx = context(Arc::new(seeded_storage().await));
    run(&ctx, "WORKER_101", StationId::Station1, &["Starting receiving"]).await;
    for _ in 0..12 {
        ctx.processor
            .process(command("WORKER_501", StationId::Station5, "Machine stopped", None))
            .await;
    }

    let dashboard = owner_dashboard(&ctx).await.expect("dashboard");
    assert_eq!(dashboard.stations.len(), 8);
    assert_eq!(dashboard.batches.len(), 1);
    assert_eq!(dashboard.alerts.len(), 10);
    assert_eq!(dashboard.statistics.total_workers, 55);
    assert_eq!(dashboard.statistics.active_stations, 1);
    assert_eq!(dashboard.statistics.delayed_stations, 0);
    assert_eq!(dashboard.statistics.total_batches, 1);
}

#[tokio::test]
async fn production_stats_cover_todays_batches() {
    let ctx = context(Arc::new(seeded_storage().await));
    let stats = production_stats(&ctx).await.expect("stats");
    assert_eq!(stats.batches_today, 1);
    assert_eq!(stats.completed_today, 0);
    assert!(stats.average_productivity >= 60.0 && stats.average_productivity < 90.0);

    run(
        &ctx,
        "WORKER_801",
        StationId::Station8,
        &["Starting quality check", "Quality check completed"],
    )
    .await;
    let stats = production_stats(&ctx).await.expect("stats");
    assert_eq!(stats.completed_today, 1);
}

#[tokio::test]
async fn productivity_groups_by_station() {
    let ctx = context(Arc::new(seeded_storage().await));
    let report = productivity(&ctx).await.expect("report");
    assert_eq!(report.workers.len(), 55);
    assert_eq!(report.station_productivity.len(), 8);

    let receiving = &report.station_productivity[&StationId::Station1];
    assert_eq!(receiving.workers.len(), 5);
    // Seeded scores 60..=64 and task counts 0, 5, .., 20.
    assert_eq!(receiving.average_score, 62.0);
    assert_eq!(receiving.total_tasks, 50);
}

#[tokio::test]
async fn wastage_sums_completed_stations() {
    let ctx = context(Arc::new(seeded_storage().await));
    run(
        &ctx,
        "WORKER_201",
        StationId::Station2,
        &["Starting washing", "Washing done"],
    )
    .await;

    let report = wastage(&ctx).await.expect("wastage");
    let washing = &report[&StationId::Station2];
    assert_eq!(washing.count, 1);
    assert!(washing.total_wastage >= 10.0 && washing.total_wastage <= 24.0);
    assert_eq!(washing.average_wastage, washing.total_wastage);

    let receiving = &report[&StationId::Station1];
    assert_eq!(receiving.total_wastage, 0.0);
}

#[tokio::test]
async fn timeline_filters_by_batch_number() {
    let ctx = context(Arc::new(seeded_storage().await));
    crate::catalog::create_batch(
        &ctx,
        shared::protocol::CreateBatchRequest {
            batch_number: "BATCH_002".to_string(),
            product_name: "ABC Powder".to_string(),
            start_date: Utc::now().date_naive(),
            end_date: Utc::now().date_naive(),
            target_quantity_kg: 80.0,
            raw_material_kg: 110.0,
        },
    )
    .await
    .expect("create");

    let all = timeline(&ctx, None).await.expect("timeline");
    assert_eq!(all.len(), 16);

    let one = timeline(&ctx, Some("BATCH_002")).await.expect("timeline");
    assert_eq!(one.len(), 8);
    assert!(one
        .iter()
        .all(|entry| entry.batch_number.as_deref() == Some("BATCH_002")));
    assert_eq!(one[0].station_name, "Raw Material Receiving");

    let unknown = timeline(&ctx, Some("BATCH_404")).await.expect("timeline");
    assert_eq!(unknown.len(), 16);
}

#[tokio::test]
async fn costs_price_wastage() {
    let ctx = context(Arc::new(seeded_storage().await)).with_wastage_cost(10.0);
    run(
        &ctx,
        "WORKER_101",
        StationId::Station1,
        &["Starting receiving", "Receiving complete"],
    )
    .await;

    let batch = batch_by_number(ctx.store(), "BATCH_001").await;
    let analysis = costs(&ctx).await.expect("costs");
    assert_eq!(analysis.raw_material_kg, 270.0);
    assert_eq!(analysis.wastage_kg, round_kg(270.0 - batch.current_quantity_kg));
    assert_eq!(analysis.wastage_cost, round2(analysis.wastage_kg * 10.0));
    assert_eq!(analysis.total_cost, analysis.wastage_cost);
}

#[tokio::test]
async fn empty_floor_projections_are_zeroed() {
    let ctx = empty_context().await;
    let stats = production_stats(&ctx).await.expect("stats");
    assert_eq!(stats.batches_today, 0);
    assert_eq!(stats.average_productivity, 0.0);

    let dashboard = owner_dashboard(&ctx).await.expect("dashboard");
    assert_eq!(dashboard.stations.len(), 8);
    assert!(dashboard.workers.is_empty());
    assert!(wastage(&ctx).await.expect("wastage").is_empty());
    assert_eq!(costs(&ctx).await.expect("costs").total_cost, 0.0);
    assert!(ctx.store().health_check().await.is_ok());
}

#[test]
fn scores_round_to_two_places() {
    assert_eq!(round2(62.456), 62.46);
    assert_eq!(round2(70.0 / 3.0), 23.33);
    assert_eq!(round2(0.0), 0.0);
}
