//! Scripted floor traffic for demos.
//!
//! Each simulated worker walks the same cycle a real worker reports through:
//! check in at the station, announce the start, occasionally report a stopped
//! machine, then announce completion. Commands go through the in-process
//! processor exactly like HTTP submissions.

use std::time::Duration;

use futures::future::join_all;
use processor::{ingest, ApiContext};
use rand::{seq::SliceRandom, Rng};
use shared::{
    domain::StationId,
    protocol::{SimulatorStatus, SubmitCommandRequest},
};
use storage::seed::{roster_worker_id, DEMO_BATCH_NUMBER};
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

const START_PHRASES: &[&str] = &[
    "Starting {task} batch {batch}",
    "Begin {task} for batch {batch}",
    "Initiated {task} at {station}",
];

const COMPLETE_PHRASES: &[&str] = &[
    "Completed {task} batch {batch}",
    "Finished {task} for batch {batch}",
    "Done with {task} at {station}",
];

const ISSUE_PHRASES: &[&str] = &[
    "Machine stopped at {station}",
    "Machine issue at {station}",
    "Equipment breakdown at {station}",
];

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Base pacing unit; every pause is a whole number of ticks.
    pub tick: Duration,
    pub cycles: u32,
    pub workers_per_station: usize,
    pub machine_issue_chance: f64,
    pub batch_number: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            cycles: 10,
            workers_per_station: 3,
            machine_issue_chance: 0.1,
            batch_number: DEMO_BATCH_NUMBER.to_string(),
        }
    }
}

pub struct Simulator {
    ctx: ApiContext,
    config: SimulatorConfig,
    run: Mutex<Option<JoinHandle<()>>>,
}

impl Simulator {
    pub fn new(ctx: ApiContext, config: SimulatorConfig) -> Self {
        Self {
            ctx,
            config,
            run: Mutex::new(None),
        }
    }

    pub async fn start(&self) -> SimulatorStatus {
        let mut run = self.run.lock().await;
        if run.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return status("Simulation already running", true);
        }

        let ctx = self.ctx.clone();
        let config = self.config.clone();
        info!(
            batch_number = %config.batch_number,
            cycles = config.cycles,
            "floor simulation started"
        );
        *run = Some(tokio::spawn(run_floor(ctx, config)));
        status("Simulation started in background", true)
    }

    pub async fn stop(&self) -> SimulatorStatus {
        let mut run = self.run.lock().await;
        match run.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                info!("floor simulation stopped");
                status("Simulation stopped", false)
            }
            _ => status("Simulation not running", false),
        }
    }

    pub async fn status(&self) -> SimulatorStatus {
        let run = self.run.lock().await;
        if run.as_ref().is_some_and(|handle| !handle.is_finished()) {
            status("Simulation running", true)
        } else {
            status("Simulation idle", false)
        }
    }
}

fn status(message: &str, running: bool) -> SimulatorStatus {
    SimulatorStatus {
        message: message.to_string(),
        running,
    }
}

async fn run_floor(ctx: ApiContext, config: SimulatorConfig) {
    let mut workers = Vec::new();
    for (offset, station) in StationId::ALL.iter().enumerate() {
        let count = station
            .default_worker_count()
            .min(config.workers_per_station);
        // Stations come online two ticks apart.
        let delay = config.tick * (2 * offset as u32);
        for position in 0..count {
            let worker_id = roster_worker_id(*station, position);
            workers.push(run_worker(&ctx, &config, worker_id, *station, delay));
        }
    }
    join_all(workers).await;
    info!("floor simulation finished");
}

async fn run_worker(
    ctx: &ApiContext,
    config: &SimulatorConfig,
    worker_id: String,
    station: StationId,
    delay: Duration,
) {
    sleep(delay).await;
    for cycle in 1..=config.cycles {
        debug!(worker_id = %worker_id, station_id = %station, cycle, "simulated work cycle");
        work_cycle(ctx, config, &worker_id, station).await;
        sleep(ticks(config.tick, 10, 20)).await;
    }
}

async fn work_cycle(ctx: &ApiContext, config: &SimulatorConfig, worker_id: &str, station: StationId) {
    if let Err(error) = ingest::update_worker_location(ctx, worker_id, station).await {
        warn!(worker_id, station_id = %station, error = %error, "simulated check-in rejected");
    }
    sleep(config.tick * 2).await;

    let start = phrase(START_PHRASES, station, &config.batch_number);
    report(ctx, config, worker_id, station, start).await;
    sleep(config.tick * 3).await;

    if roll(config.machine_issue_chance) {
        let issue = phrase(ISSUE_PHRASES, station, &config.batch_number);
        report(ctx, config, worker_id, station, issue).await;
        sleep(config.tick * 5).await;
    }

    sleep(ticks(config.tick, 5, 15)).await;
    let done = phrase(COMPLETE_PHRASES, station, &config.batch_number);
    report(ctx, config, worker_id, station, done).await;
}

async fn report(
    ctx: &ApiContext,
    config: &SimulatorConfig,
    worker_id: &str,
    station: StationId,
    raw_command: String,
) {
    let request = SubmitCommandRequest {
        worker_id: worker_id.to_string(),
        station_id: station,
        raw_command,
        batch_number: Some(config.batch_number.clone()),
    };
    if let Err(error) = ingest::submit_command(ctx, request).await {
        warn!(worker_id, station_id = %station, error = %error, "simulated command rejected");
    }
}

fn phrase(templates: &[&str], station: StationId, batch_number: &str) -> String {
    let template = templates
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default();
    template
        .replace("{task}", station.task_phrase())
        .replace("{batch}", batch_number)
        .replace("{station}", station.as_str())
}

fn ticks(tick: Duration, min: u32, max: u32) -> Duration {
    tick * rand::thread_rng().gen_range(min..=max)
}

fn roll(chance: f64) -> bool {
    chance > 0.0 && rand::thread_rng().gen_bool(chance.min(1.0))
}

#[cfg(test)]
#[path = "tests/simulator_tests.rs"]
mod tests;
