use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{
    Alert, Batch, BatchId, Station, StationId, StationProgress, VoiceCommandLog, Worker,
    WorkerActivity,
};
use storage::{
    seed_demo_floor, BatchPatch, CommandLogPatch, Filter, NewActivity, NewAlert, NewBatch,
    NewCommandLog, NewWorker, ProgressPatch, ProgressStore, Query, StationPatch, Storage,
    WorkerPatch,
};

use crate::{ApiContext, CommandProcessor, FloorCommand, RetryPolicy};

pub(crate) async fn seeded_storage() -> Storage {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    seed_demo_floor(&storage).await.expect("seed");
    storage
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

pub(crate) fn processor(store: Arc<dyn ProgressStore>) -> CommandProcessor {
    CommandProcessor::new(store).with_retry_policy(fast_retry())
}

pub(crate) fn context(store: Arc<dyn ProgressStore>) -> ApiContext {
    ApiContext::new(processor(store))
}

pub(crate) fn command(
    worker_id: &str,
    station_id: StationId,
    raw_command: &str,
    batch_number: Option<&str>,
) -> FloorCommand {
    FloorCommand {
        worker_id: worker_id.to_string(),
        station_id,
        raw_command: raw_command.to_string(),
        batch_number: batch_number.map(str::to_string),
    }
}

pub(crate) async fn batch_by_number(store: &dyn ProgressStore, number: &str) -> Batch {
    store
        .batches(Query::all().eq("batch_number", number))
        .await
        .expect("batches")
        .into_iter()
        .next()
        .expect("batch exists")
}

pub(crate) async fn progress_for(
    store: &dyn ProgressStore,
    batch_id: BatchId,
    station_id: StationId,
) -> StationProgress {
    store
        .progress(
            Query::all()
                .eq("batch_id", batch_id)
                .eq("station_id", station_id),
        )
        .await
        .expect("progress")
        .into_iter()
        .next()
        .expect("progress record")
}

pub(crate) async fn station(store: &dyn ProgressStore, station_id: StationId) -> Station {
    store
        .stations(Query::all().eq("station_id", station_id))
        .await
        .expect("stations")
        .into_iter()
        .next()
        .expect("station")
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Transient,
    Permanent,
}

/// Store wrapper that fails chosen operations a set number of times.
pub(crate) struct FlakyStore {
    inner: Storage,
    plan: Mutex<HashMap<&'static str, (u32, Failure)>>,
    calls: Mutex<HashMap<&'static str, u32>>,
}

impl FlakyStore {
    pub(crate) fn new(inner: Storage) -> Self {
        Self {
            inner,
            plan: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn fail(&self, op: &'static str, times: u32, failure: Failure) {
        self.plan.lock().expect("plan").insert(op, (times, failure));
    }

    pub(crate) fn calls(&self, op: &'static str) -> u32 {
        self.calls
            .lock()
            .expect("calls")
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    fn check(&self, op: &'static str) -> Result<()> {
        *self.calls.lock().expect("calls").entry(op).or_default() += 1;
        let mut plan = self.plan.lock().expect("plan");
        let Some((remaining, failure)) = plan.get_mut(op) else {
            return Ok(());
        };
        if *remaining == 0 {
            return Ok(());
        }
        *remaining -= 1;
        Err(match failure {
            Failure::Transient => anyhow!("connection reset during {op}"),
            Failure::Permanent => anyhow!("{op} rejected: constraint failed"),
        })
    }
}

#[async_trait]
impl ProgressStore for FlakyStore {
    async fn create_batch(&self, batch: NewBatch) -> Result<Batch> {
        self.check("create_batch")?;
        self.inner.create_batch(batch).await
    }

    async fn batches(&self, query: Query) -> Result<Vec<Batch>> {
        self.check("batches")?;
        self.inner.batches(query).await
    }

    async fn update_batches(&self, filter: Filter, patch: BatchPatch) -> Result<Vec<Batch>> {
        self.check("update_batches")?;
        self.inner.update_batches(filter, patch).await
    }

    async fn progress(&self, query: Query) -> Result<Vec<StationProgress>> {
        self.check("progress")?;
        self.inner.progress(query).await
    }

    async fn update_progress(
        &self,
        filter: Filter,
        patch: ProgressPatch,
    ) -> Result<Vec<StationProgress>> {
        self.check("update_progress")?;
        self.inner.update_progress(filter, patch).await
    }

    async fn stations(&self, query: Query) -> Result<Vec<Station>> {
        self.check("stations")?;
        self.inner.stations(query).await
    }

    async fn update_stations(&self, filter: Filter, patch: StationPatch) -> Result<Vec<Station>> {
        self.check("update_stations")?;
        self.inner.update_stations(filter, patch).await
    }

    async fn insert_worker(&self, worker: NewWorker) -> Result<Worker> {
        self.check("insert_worker")?;
        self.inner.insert_worker(worker).await
    }

    async fn workers(&self, query: Query) -> Result<Vec<Worker>> {
        self.check("workers")?;
        self.inner.workers(query).await
    }

    async fn update_workers(&self, filter: Filter, patch: WorkerPatch) -> Result<Vec<Worker>> {
        self.check("update_workers")?;
        self.inner.update_workers(filter, patch).await
    }

    async fn credit_task_completed(&self, worker_id: &str) -> Result<Option<Worker>> {
        self.check("credit_task_completed")?;
        self.inner.credit_task_completed(worker_id).await
    }

    async fn insert_activity(&self, activity: NewActivity) -> Result<WorkerActivity> {
        self.check("insert_activity")?;
        self.inner.insert_activity(activity).await
    }

    async fn activities(&self, query: Query) -> Result<Vec<WorkerActivity>> {
        self.check("activities")?;
        self.inner.activities(query).await
    }

    async fn insert_command_log(&self, log: NewCommandLog) -> Result<VoiceCommandLog> {
        self.check("insert_command_log")?;
        self.inner.insert_command_log(log).await
    }

    async fn command_logs(&self, query: Query) -> Result<Vec<VoiceCommandLog>> {
        self.check("command_logs")?;
        self.inner.command_logs(query).await
    }

    async fn update_command_logs(
        &self,
        filter: Filter,
        patch: CommandLogPatch,
    ) -> Result<Vec<VoiceCommandLog>> {
        self.check("update_command_logs")?;
        self.inner.update_command_logs(filter, patch).await
    }

    async fn insert_alert(&self, alert: NewAlert) -> Result<Alert> {
        self.check("insert_alert")?;
        self.inner.insert_alert(alert).await
    }

    async fn alerts(&self, query: Query) -> Result<Vec<Alert>> {
        self.check("alerts")?;
        self.inner.alerts(query).await
    }

    async fn health_check(&self) -> Result<()> {
        self.check("health_check")?;
        self.inner.health_check().await
    }
}
