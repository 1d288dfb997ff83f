use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Alert, Batch, CommandAction, Intent, Station, StationId, StationProgress, StationStatus,
    Worker,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCommandRequest {
    pub worker_id: String,
    pub station_id: StationId,
    pub raw_command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
}

/// One sub-step of command processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    LogCommand,
    ResolveBatch,
    RecordActivity,
    StartProgress,
    AdvanceBatch,
    CompleteProgress,
    UpdateBatchQuantity,
    CreditWorker,
    RaiseAlert,
    UpdateStationStatus,
    MarkProcessed,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::LogCommand => "log_command",
            Step::ResolveBatch => "resolve_batch",
            Step::RecordActivity => "record_activity",
            Step::StartProgress => "start_progress",
            Step::AdvanceBatch => "advance_batch",
            Step::CompleteProgress => "complete_progress",
            Step::UpdateBatchQuantity => "update_batch_quantity",
            Step::CreditWorker => "credit_worker",
            Step::RaiseAlert => "raise_alert",
            Step::UpdateStationStatus => "update_station_status",
            Step::MarkProcessed => "mark_processed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Skipped { reason: String },
    FailedTransient { error: String },
    FailedPermanent { error: String },
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StepOutcome::FailedTransient { .. } | StepOutcome::FailedPermanent { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCommandResponse {
    pub message: String,
    pub parsed: Intent,
    pub worker_id: String,
    pub station_id: StationId,
    #[serde(default)]
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdateRequest {
    pub worker_id: String,
    pub station_id: StationId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdateResponse {
    pub message: String,
    pub worker_id: String,
    pub station_id: StationId,
}

fn default_product_name() -> String {
    "ABC Powder".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub batch_number: String,
    #[serde(default = "default_product_name")]
    pub product_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_quantity_kg: f64,
    pub raw_material_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressView {
    #[serde(flatten)]
    pub progress: StationProgress,
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgressResponse {
    pub batch: Batch,
    pub progress: Vec<ProgressView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationStatusUpdate {
    pub status: StationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationStatusResponse {
    pub message: String,
    pub station_id: StationId,
    pub status: StationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorStatistics {
    pub total_workers: usize,
    pub active_stations: usize,
    pub delayed_stations: usize,
    pub total_batches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerDashboard {
    pub stations: Vec<Station>,
    pub batches: Vec<Batch>,
    pub alerts: Vec<Alert>,
    pub workers: Vec<Worker>,
    pub statistics: FloorStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionStats {
    pub batches_today: usize,
    pub completed_today: usize,
    pub average_productivity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationProductivity {
    pub workers: Vec<Worker>,
    pub average_score: f64,
    pub total_tasks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductivityReport {
    pub workers: Vec<Worker>,
    pub station_productivity: BTreeMap<StationId, StationProductivity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationWastage {
    pub total_wastage: f64,
    pub count: usize,
    pub average_wastage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub progress: StationProgress,
    pub batch_number: Option<String>,
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostAnalysis {
    pub raw_material_kg: f64,
    pub wastage_kg: f64,
    pub wastage_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorStatus {
    pub message: String,
    pub running: bool,
}

/// Live notifications pushed to floor dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FloorEvent {
    CommandProcessed {
        worker_id: String,
        station_id: StationId,
        action: Option<CommandAction>,
        batch_number: Option<String>,
    },
    StationStatusChanged {
        station_id: StationId,
        status: StationStatus,
    },
    AlertRaised {
        alert: Alert,
    },
}
