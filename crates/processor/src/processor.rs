//! Applies floor reports to stored batch and station state.
//!
//! Every report is logged, parsed and then applied as a sequence of
//! independent sub-steps. A failing sub-step is recorded and skipped; the
//! remaining steps still run and the caller always gets a
//! [`ProcessingResult`].

use std::{future::Future, sync::Arc};

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use shared::{
    domain::{
        round_kg, ActivityType, AlertSeverity, AlertType, Batch, BatchId, BatchStatus,
        CommandAction, Intent, ProgressStatus, StationId, StationStatus, Yield,
    },
    protocol::{FloorEvent, Step, StepOutcome, StepReport, SubmitCommandRequest},
};
use storage::{
    BatchPatch, CommandLogPatch, Filter, NewActivity, NewAlert, NewCommandLog, ProgressPatch,
    ProgressStore, Query, StationPatch,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    locks::ProgressLocks,
    retry::{retry, RetryPolicy},
};

/// Bounds of the wastage fraction drawn when a station completes.
pub const WASTAGE_FRACTION_MIN: f64 = 0.05;
pub const WASTAGE_FRACTION_MAX: f64 = 0.12;

const NO_BATCH: &str = "no resolved batch";

/// A raw report from a worker at a station.
#[derive(Debug, Clone)]
pub struct FloorCommand {
    pub worker_id: String,
    pub station_id: StationId,
    pub raw_command: String,
    pub batch_number: Option<String>,
}

impl From<SubmitCommandRequest> for FloorCommand {
    fn from(req: SubmitCommandRequest) -> Self {
        Self {
            worker_id: req.worker_id,
            station_id: req.station_id,
            raw_command: req.raw_command,
            batch_number: req.batch_number,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub intent: Intent,
    /// Batch reference that resolved, else the first one tried.
    pub batch_number: Option<String>,
    pub batch_id: Option<BatchId>,
    pub steps: Vec<StepReport>,
}

impl ProcessingResult {
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|report| report.step == step)
            .map(|report| &report.outcome)
    }

    pub fn applied(&self, step: Step) -> bool {
        matches!(self.outcome(step), Some(StepOutcome::Applied))
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|report| report.outcome.is_failure())
    }
}

/// Per-command bookkeeping of sub-step outcomes.
struct Trace<'a> {
    command: &'a FloorCommand,
    /// Batch references in lookup order: the caller's, then the spoken one.
    references: Vec<String>,
    batch_number: Option<String>,
    steps: Vec<StepReport>,
}

impl<'a> Trace<'a> {
    fn new(command: &'a FloorCommand, references: Vec<String>) -> Self {
        Self {
            command,
            batch_number: references.first().cloned(),
            references,
            steps: Vec::new(),
        }
    }

    fn references_label(&self) -> String {
        if self.references.is_empty() {
            "-".to_string()
        } else {
            self.references.join(", ")
        }
    }

    fn record(&mut self, step: Step, outcome: StepOutcome) {
        if let StepOutcome::FailedTransient { error } | StepOutcome::FailedPermanent { error } =
            &outcome
        {
            warn!(
                worker_id = %self.command.worker_id,
                station_id = %self.command.station_id,
                batch_number = %self.references_label(),
                raw_command = %self.command.raw_command,
                step = step.as_str(),
                error = %error,
                "command sub-step failed"
            );
        }
        self.steps.push(StepReport { step, outcome });
    }

    fn skip(&mut self, step: Step, reason: impl Into<String>) {
        self.record(step, StepOutcome::skipped(reason));
    }
}

pub struct CommandProcessor {
    store: Arc<dyn ProgressStore>,
    retry: RetryPolicy,
    locks: ProgressLocks,
    events: Option<broadcast::Sender<FloorEvent>>,
}

impl CommandProcessor {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            locks: ProgressLocks::default(),
            events: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<FloorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn publish(&self, event: FloorEvent) {
        if let Some(events) = &self.events {
            // No subscribers is fine.
            let _ = events.send(event);
        }
    }

    pub async fn process(&self, command: FloorCommand) -> ProcessingResult {
        let intent = voice_parser::parse(&command.raw_command);
        let mut trace = Trace::new(&command, batch_references(&command, &intent));
        let store = self.store.as_ref();

        let entry = NewCommandLog {
            worker_id: command.worker_id.clone(),
            station_id: command.station_id,
            raw_command: command.raw_command.clone(),
            parsed_action: intent.action,
            parsed_entity: intent.entity.clone(),
            batch_number: trace.batch_number.clone(),
        };
        let log = self
            .attempt(&mut trace, Step::LogCommand, move || {
                store.insert_command_log(entry.clone())
            })
            .await;

        let batch = self.resolve_batch(&mut trace).await;

        match intent.action {
            Some(CommandAction::Starting) => {
                self.apply_starting(&mut trace, &intent, batch.as_ref()).await
            }
            Some(CommandAction::Completed) => {
                self.apply_completed(&mut trace, &intent, batch.as_ref()).await
            }
            Some(CommandAction::MachineStopped) => {
                self.apply_machine_stopped(&mut trace, batch.as_ref()).await
            }
            // Received, moving, quality checks and unrecognised text are
            // only logged.
            Some(_) | None => {}
        }

        match log {
            Some(entry) => {
                let id = entry.id;
                self.attempt_update(
                    &mut trace,
                    Step::MarkProcessed,
                    "command log entry missing",
                    move || {
                        store.update_command_logs(
                            Filter::new().eq("id", id),
                            CommandLogPatch {
                                processed: Some(true),
                            },
                        )
                    },
                )
                .await;
            }
            None => trace.skip(Step::MarkProcessed, "command was not logged"),
        }

        let failed = trace.steps.iter().filter(|r| r.outcome.is_failure()).count();
        let batch_number = trace.batch_number.clone();
        info!(
            worker_id = %command.worker_id,
            station_id = %command.station_id,
            action = intent.action.map(|a| a.as_str()).unwrap_or("unknown"),
            batch_number = %trace.references_label(),
            resolved = batch.is_some(),
            failed,
            "processed floor command"
        );
        self.publish(FloorEvent::CommandProcessed {
            worker_id: command.worker_id.clone(),
            station_id: command.station_id,
            action: intent.action,
            batch_number: batch_number.clone(),
        });

        let steps = trace.steps;
        ProcessingResult {
            intent,
            batch_number,
            batch_id: batch.map(|b| b.id),
            steps,
        }
    }

    /// Sets a station's status and announces the change.
    pub async fn set_station_status(
        &self,
        station_id: StationId,
        status: StationStatus,
    ) -> Result<bool> {
        let updated = self
            .store
            .update_stations(
                Filter::new().eq("station_id", station_id),
                StationPatch::status(status),
            )
            .await?;
        if updated.is_empty() {
            return Ok(false);
        }
        self.publish(FloorEvent::StationStatusChanged { station_id, status });
        Ok(true)
    }

    async fn resolve_batch(&self, trace: &mut Trace<'_>) -> Option<Batch> {
        if trace.references.is_empty() {
            trace.skip(Step::ResolveBatch, "no batch reference");
            return None;
        }
        let store = self.store.as_ref();
        for number in trace.references.clone() {
            let candidates = batch_candidates(&number);
            let lookup = retry(&self.retry, Step::ResolveBatch.as_str(), move || {
                store.batches(Query::all().in_("batch_number", candidates.clone()))
            })
            .await;

            let rows = match lookup {
                Ok(rows) => rows,
                Err(failure) => {
                    trace.record(Step::ResolveBatch, failure.into_outcome());
                    return None;
                }
            };
            // Prefer the literal reference over a normalised spelling.
            let found = rows
                .iter()
                .find(|batch| batch.batch_number == number)
                .or_else(|| rows.first())
                .cloned();
            if let Some(batch) = found {
                trace.batch_number = Some(number);
                trace.record(Step::ResolveBatch, StepOutcome::Applied);
                return Some(batch);
            }
        }

        let reason = format!("batch '{}' not found", trace.references.join("' / '"));
        trace.skip(Step::ResolveBatch, reason);
        None
    }

    async fn apply_starting(&self, trace: &mut Trace<'_>, intent: &Intent, batch: Option<&Batch>) {
        let station = trace.command.station_id;
        let description = format!("Started {} at {station}", subject(intent, station));
        self.record_activity(trace, ActivityType::TaskStart, description)
            .await;

        match batch {
            Some(batch) => {
                let _guard = self.locks.lock(batch.id, station).await;
                let store = self.store.as_ref();
                let key = progress_key(batch.id, station);
                let patch = ProgressPatch {
                    status: Some(ProgressStatus::InProgress),
                    start_time: Some(Utc::now()),
                    workers_assigned: Some(1),
                    input_quantity_kg: Some(round_kg(
                        batch.target_quantity_kg * station.intake_multiplier(),
                    )),
                    reopen: true,
                    ..ProgressPatch::default()
                };
                self.attempt_update(
                    trace,
                    Step::StartProgress,
                    "no progress record for station",
                    move || store.update_progress(key.clone(), patch.clone()),
                )
                .await;

                let batch_id = batch.id;
                self.attempt_update(trace, Step::AdvanceBatch, "batch no longer exists", move || {
                    store.update_batches(
                        Filter::new().eq("id", batch_id),
                        BatchPatch {
                            current_station: Some(station),
                            overall_status: Some(BatchStatus::InProgress),
                            ..BatchPatch::default()
                        },
                    )
                })
                .await;
            }
            None => {
                trace.skip(Step::StartProgress, NO_BATCH);
                trace.skip(Step::AdvanceBatch, NO_BATCH);
            }
        }

        self.update_station(trace, StationStatus::Active).await;
    }

    async fn apply_completed(&self, trace: &mut Trace<'_>, intent: &Intent, batch: Option<&Batch>) {
        let station = trace.command.station_id;
        let description = format!("Completed {} at {station}", subject(intent, station));
        self.record_activity(trace, ActivityType::TaskComplete, description)
            .await;

        match batch {
            Some(batch) => {
                let _guard = self.locks.lock(batch.id, station).await;
                match self.complete_progress(trace, batch.id, station).await {
                    Some(split) => {
                        self.record_batch_output(trace, batch.id, station, split)
                            .await;
                        self.credit_worker(trace).await;
                    }
                    None => {
                        trace.skip(Step::UpdateBatchQuantity, "station completion not recorded");
                        trace.skip(Step::CreditWorker, "station completion not recorded");
                    }
                }
            }
            None => {
                trace.skip(Step::CompleteProgress, NO_BATCH);
                trace.skip(Step::UpdateBatchQuantity, NO_BATCH);
                trace.skip(Step::CreditWorker, NO_BATCH);
            }
        }

        self.update_station(trace, StationStatus::Completed).await;
    }

    async fn apply_machine_stopped(&self, trace: &mut Trace<'_>, batch: Option<&Batch>) {
        let command = trace.command;
        let store = self.store.as_ref();
        let alert = NewAlert {
            alert_type: AlertType::MachineFailure,
            severity: AlertSeverity::High,
            station_id: command.station_id,
            batch_id: batch.map(|b| b.id),
            message: format!(
                "Machine stopped at {} - reported by {}",
                command.station_id, command.worker_id
            ),
        };
        let raised = self
            .attempt(trace, Step::RaiseAlert, move || {
                store.insert_alert(alert.clone())
            })
            .await;
        if let Some(alert) = raised {
            self.publish(FloorEvent::AlertRaised { alert });
        }

        self.update_station(trace, StationStatus::Stopped).await;
        self.record_activity(trace, ActivityType::MachineIssue, command.raw_command.clone())
            .await;
    }

    /// Marks the progress record completed with a freshly drawn yield.
    /// Returns the split when the record was written.
    async fn complete_progress(
        &self,
        trace: &mut Trace<'_>,
        batch_id: BatchId,
        station: StationId,
    ) -> Option<Yield> {
        let store = self.store.as_ref();
        let key = progress_key(batch_id, station);
        let lookup = key.clone();
        let rows = match retry(&self.retry, "load_progress", move || {
            store.progress(Query::from(lookup.clone()).limit(1))
        })
        .await
        {
            Ok(rows) => rows,
            Err(failure) => {
                trace.record(Step::CompleteProgress, failure.into_outcome());
                return None;
            }
        };

        let Some(record) = rows.into_iter().next() else {
            trace.skip(Step::CompleteProgress, "no progress record for station");
            return None;
        };
        let Some(input_kg) = record.input_quantity_kg else {
            trace.skip(Step::CompleteProgress, "station has no recorded input");
            return None;
        };
        let split = match Yield::from_fraction(input_kg, draw_wastage_fraction()) {
            Ok(split) => split,
            Err(err) => {
                trace.record(
                    Step::CompleteProgress,
                    StepOutcome::FailedPermanent {
                        error: err.to_string(),
                    },
                );
                return None;
            }
        };

        let now = Utc::now();
        let patch = ProgressPatch {
            status: Some(ProgressStatus::Completed),
            start_time: record.start_time.is_none().then_some(now),
            end_time: Some(now),
            output_quantity_kg: Some(split.output_kg),
            wastage_kg: Some(split.wastage_kg),
            ..ProgressPatch::default()
        };
        self.attempt_update(
            trace,
            Step::CompleteProgress,
            "no progress record for station",
            move || store.update_progress(key.clone(), patch.clone()),
        )
        .await
        .map(|_| split)
    }

    async fn record_batch_output(
        &self,
        trace: &mut Trace<'_>,
        batch_id: BatchId,
        station: StationId,
        split: Yield,
    ) {
        let store = self.store.as_ref();
        let patch = BatchPatch {
            current_quantity_kg: Some(split.output_kg),
            overall_status: (station == StationId::FINAL).then_some(BatchStatus::Completed),
            ..BatchPatch::default()
        };
        self.attempt_update(
            trace,
            Step::UpdateBatchQuantity,
            "batch no longer exists",
            move || store.update_batches(Filter::new().eq("id", batch_id), patch.clone()),
        )
        .await;
    }

    async fn credit_worker(&self, trace: &mut Trace<'_>) {
        let store = self.store.as_ref();
        let worker_id = trace.command.worker_id.clone();
        let credited = retry(&self.retry, Step::CreditWorker.as_str(), move || {
            let worker_id = worker_id.clone();
            async move { store.credit_task_completed(&worker_id).await }
        })
        .await;
        match credited {
            Ok(Some(_)) => trace.record(Step::CreditWorker, StepOutcome::Applied),
            Ok(None) => trace.skip(Step::CreditWorker, "unknown worker"),
            Err(failure) => trace.record(Step::CreditWorker, failure.into_outcome()),
        }
    }

    async fn record_activity(
        &self,
        trace: &mut Trace<'_>,
        activity_type: ActivityType,
        description: String,
    ) {
        let store = self.store.as_ref();
        let activity = NewActivity {
            worker_id: trace.command.worker_id.clone(),
            station_id: trace.command.station_id,
            activity_type,
            description,
            batch_number: trace.batch_number.clone(),
        };
        self.attempt(trace, Step::RecordActivity, move || {
            store.insert_activity(activity.clone())
        })
        .await;
    }

    async fn update_station(&self, trace: &mut Trace<'_>, status: StationStatus) {
        let store = self.store.as_ref();
        let station_id = trace.command.station_id;
        let updated = self
            .attempt_update(
                trace,
                Step::UpdateStationStatus,
                "station missing from catalog",
                move || {
                    store.update_stations(
                        Filter::new().eq("station_id", station_id),
                        StationPatch::status(status),
                    )
                },
            )
            .await;
        if updated.is_some() {
            self.publish(FloorEvent::StationStatusChanged { station_id, status });
        }
    }

    async fn attempt<T, F, Fut>(&self, trace: &mut Trace<'_>, step: Step, op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match retry(&self.retry, step.as_str(), op).await {
            Ok(value) => {
                trace.record(step, StepOutcome::Applied);
                Some(value)
            }
            Err(failure) => {
                trace.record(step, failure.into_outcome());
                None
            }
        }
    }

    /// Like `attempt` for updates: matching nothing counts as skipped.
    async fn attempt_update<R, F, Fut>(
        &self,
        trace: &mut Trace<'_>,
        step: Step,
        missing: &str,
        op: F,
    ) -> Option<Vec<R>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<R>>>,
    {
        match retry(&self.retry, step.as_str(), op).await {
            Ok(rows) if rows.is_empty() => {
                trace.skip(step, missing);
                None
            }
            Ok(rows) => {
                trace.record(step, StepOutcome::Applied);
                Some(rows)
            }
            Err(failure) => {
                trace.record(step, failure.into_outcome());
                None
            }
        }
    }
}

fn progress_key(batch_id: BatchId, station: StationId) -> Filter {
    Filter::new()
        .eq("batch_id", batch_id)
        .eq("station_id", station)
}

fn subject(intent: &Intent, station: StationId) -> String {
    intent
        .entity
        .clone()
        .unwrap_or_else(|| station.task_phrase().to_string())
}

/// Spellings a spoken batch reference may be stored under. A bare number
/// also matches the zero-padded `BATCH_nnn` form.
fn batch_references(command: &FloorCommand, intent: &Intent) -> Vec<String> {
    let mut references = Vec::new();
    let explicit = command
        .batch_number
        .as_deref()
        .map(str::trim)
        .filter(|number| !number.is_empty());
    for number in explicit.into_iter().chain(intent.batch_number.as_deref()) {
        if !references.iter().any(|known| known == number) {
            references.push(number.to_string());
        }
    }
    references
}

fn batch_candidates(reference: &str) -> Vec<String> {
    let mut candidates = vec![reference.to_string()];
    if let Ok(number) = reference.parse::<u32>() {
        candidates.push(format!("BATCH_{number:03}"));
    }
    candidates
}

fn draw_wastage_fraction() -> f64 {
    rand::thread_rng().gen_range(WASTAGE_FRACTION_MIN..=WASTAGE_FRACTION_MAX)
}

#[cfg(test)]
#[path = "tests/processor_tests.rs"]
mod tests;
