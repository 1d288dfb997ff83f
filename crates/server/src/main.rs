use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post, put},
    Router,
};
use processor::{ApiContext, CommandProcessor};
use storage::{seed_demo_floor, Storage};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod simulator;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use simulator::{Simulator, SimulatorConfig};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    if settings.seed_demo_data {
        let summary = seed_demo_floor(&storage).await?;
        info!(
            workers_created = summary.workers_created,
            batch_created = summary.batch_created,
            "demo floor seeded"
        );
    }

    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let processor = CommandProcessor::new(Arc::new(storage))
        .with_retry_policy(settings.retry_policy())
        .with_events(events.clone());
    let api = ApiContext::new(processor).with_wastage_cost(settings.wastage_cost_per_kg);
    let simulator = Simulator::new(
        api.clone(),
        SimulatorConfig {
            tick: settings.simulator_tick(),
            ..SimulatorConfig::default()
        },
    );

    let state = AppState {
        api,
        events,
        simulator: Arc::new(simulator),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/api/voice/command", post(api::http_submit_command))
        .route("/api/voice/commands", get(api::http_recent_commands))
        .route("/api/workers", get(api::http_list_workers))
        .route("/api/workers/:worker_id", get(api::http_get_worker))
        .route(
            "/api/workers/:worker_id/location",
            put(api::http_update_worker_location),
        )
        .route(
            "/api/batches",
            get(api::http_list_batches).post(api::http_create_batch),
        )
        .route("/api/batches/:batch_id", get(api::http_get_batch))
        .route("/api/batches/:batch_id/progress", get(api::http_batch_progress))
        .route("/api/stations", get(api::http_list_stations))
        .route("/api/stations/:station_id", get(api::http_get_station))
        .route(
            "/api/stations/:station_id/workers",
            get(api::http_station_workers),
        )
        .route(
            "/api/stations/:station_id/status",
            put(api::http_update_station_status),
        )
        .route("/api/alerts", get(api::http_list_alerts))
        .route("/api/dashboard/owner", get(api::http_owner_dashboard))
        .route("/api/dashboard/stats", get(api::http_production_stats))
        .route("/api/analytics/productivity", get(api::http_productivity))
        .route("/api/analytics/wastage", get(api::http_wastage))
        .route("/api/analytics/timeline", get(api::http_timeline))
        .route("/api/analytics/costs", get(api::http_costs))
        .route("/api/simulator/run", post(api::http_simulator_run))
        .route("/api/simulator/stop", post(api::http_simulator_stop))
        .route("/api/simulator/status", get(api::http_simulator_status))
        .route("/ws", get(api::ws_handler))
        .with_state(state)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
