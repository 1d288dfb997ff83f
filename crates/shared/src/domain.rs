use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QuantityError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(BatchId);
id_newtype!(ProgressId);
id_newtype!(WorkerRecordId);
id_newtype!(ActivityId);
id_newtype!(CommandLogId);
id_newtype!(AlertId);

/// Generates `as_str`, `Display` and `FromStr` for a closed string enum whose
/// serde representation matches the listed literals.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// The eight fixed processing stations, in line order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StationId {
    #[serde(rename = "STATION_1")]
    Station1,
    #[serde(rename = "STATION_2")]
    Station2,
    #[serde(rename = "STATION_3")]
    Station3,
    #[serde(rename = "STATION_4")]
    Station4,
    #[serde(rename = "STATION_5")]
    Station5,
    #[serde(rename = "STATION_6")]
    Station6,
    #[serde(rename = "STATION_7")]
    Station7,
    #[serde(rename = "STATION_8")]
    Station8,
}

wire_enum!(StationId {
    Station1 => "STATION_1",
    Station2 => "STATION_2",
    Station3 => "STATION_3",
    Station4 => "STATION_4",
    Station5 => "STATION_5",
    Station6 => "STATION_6",
    Station7 => "STATION_7",
    Station8 => "STATION_8",
});

impl StationId {
    pub const RECEIVING: StationId = StationId::Station1;
    pub const FINAL: StationId = StationId::Station8;

    /// 1-based position on the line.
    pub fn number(&self) -> u8 {
        match self {
            StationId::Station1 => 1,
            StationId::Station2 => 2,
            StationId::Station3 => 3,
            StationId::Station4 => 4,
            StationId::Station5 => 5,
            StationId::Station6 => 6,
            StationId::Station7 => 7,
            StationId::Station8 => 8,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StationId::Station1 => "Raw Material Receiving",
            StationId::Station2 => "Washing & Peeling",
            StationId::Station3 => "Blanching",
            StationId::Station4 => "Slicing",
            StationId::Station5 => "Drying (Tunnel Dryer)",
            StationId::Station6 => "Grinding & Sieving",
            StationId::Station7 => "Packaging & Mixing",
            StationId::Station8 => "Quality Check & Dispatch",
        }
    }

    /// Task phrase a worker at this station uses when reporting.
    pub fn task_phrase(&self) -> &'static str {
        match self {
            StationId::Station1 => "receiving",
            StationId::Station2 => "washing",
            StationId::Station3 => "blanching",
            StationId::Station4 => "slicing",
            StationId::Station5 => "drying",
            StationId::Station6 => "grinding",
            StationId::Station7 => "packaging",
            StationId::Station8 => "quality check",
        }
    }

    /// Input multiplier applied to a batch target when work starts here.
    /// Receiving takes in raw-material overage to cover downstream wastage.
    pub fn intake_multiplier(&self) -> f64 {
        match self {
            StationId::Station1 => 1.35,
            _ => 1.0,
        }
    }

    /// Size of the default worker roster for this station.
    pub fn default_worker_count(&self) -> usize {
        match self {
            StationId::Station1 => 5,
            StationId::Station2 => 8,
            StationId::Station3 => 6,
            StationId::Station4 => 7,
            StationId::Station5 => 10,
            StationId::Station6 => 7,
            StationId::Station7 => 8,
            StationId::Station8 => 4,
        }
    }

    pub fn next(&self) -> Option<StationId> {
        let idx = usize::from(self.number());
        Self::ALL.get(idx).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Pending,
    InProgress,
    Completed,
}

wire_enum!(ProgressStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    Idle,
    Active,
    Completed,
    Delayed,
    Stopped,
}

wire_enum!(StationStatus {
    Idle => "idle",
    Active => "active",
    Completed => "completed",
    Delayed => "delayed",
    Stopped => "stopped",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    NotStarted,
    InProgress,
    Completed,
}

wire_enum!(BatchStatus {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    MachineFailure,
}

wire_enum!(AlertType {
    MachineFailure => "machine_failure",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

wire_enum!(AlertSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    TaskStart,
    TaskComplete,
    MachineIssue,
}

wire_enum!(ActivityType {
    TaskStart => "task_start",
    TaskComplete => "task_complete",
    MachineIssue => "machine_issue",
});

/// Action recognised in a floor report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Starting,
    Completed,
    Received,
    Moving,
    MachineStopped,
    QualityCheck,
}

wire_enum!(CommandAction {
    Starting => "starting",
    Completed => "completed",
    Received => "received",
    Moving => "moving",
    MachineStopped => "machine_stopped",
    QualityCheck => "quality_check",
});

/// Structured reading of a raw floor report. Every field is best effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: Option<CommandAction>,
    /// Keyword that produced the station guess.
    pub entity: Option<String>,
    pub station: Option<StationId>,
    pub batch_number: Option<String>,
    pub quantity_kg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub batch_number: String,
    pub product_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_quantity_kg: f64,
    pub raw_material_kg: f64,
    pub current_quantity_kg: f64,
    pub current_station: StationId,
    pub overall_status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationProgress {
    pub id: ProgressId,
    pub batch_id: BatchId,
    pub station_id: StationId,
    pub status: ProgressStatus,
    pub input_quantity_kg: Option<f64>,
    pub output_quantity_kg: Option<f64>,
    pub wastage_kg: Option<f64>,
    pub workers_assigned: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub station_id: StationId,
    pub station_name: String,
    pub capacity: i64,
    pub current_status: StationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerRecordId,
    pub worker_id: String,
    pub worker_name: String,
    pub station_id: StationId,
    pub productivity_score: f64,
    pub total_tasks_completed: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerActivity {
    pub id: ActivityId,
    pub worker_id: String,
    pub station_id: StationId,
    pub activity_type: ActivityType,
    pub description: String,
    pub batch_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit entry for one received floor report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceCommandLog {
    pub id: CommandLogId,
    pub worker_id: String,
    pub station_id: StationId,
    pub raw_command: String,
    pub parsed_action: Option<CommandAction>,
    pub parsed_entity: Option<String>,
    pub batch_number: Option<String>,
    pub processed: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub station_id: StationId,
    pub batch_id: Option<BatchId>,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// Rounds a quantity to two decimals, the precision progress records keep.
pub fn round_kg(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split of a station's input into output and wastage once work completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Yield {
    pub input_kg: f64,
    pub output_kg: f64,
    pub wastage_kg: f64,
}

impl Yield {
    /// Builds the split from a recorded input and a wastage fraction.
    /// Output is derived from the rounded wastage so the two always sum to
    /// the input.
    pub fn from_fraction(input_kg: f64, wastage_fraction: f64) -> Result<Self, QuantityError> {
        if !input_kg.is_finite() || !wastage_fraction.is_finite() {
            return Err(QuantityError::NotFinite);
        }
        if input_kg < 0.0 {
            return Err(QuantityError::Negative { value: input_kg });
        }
        if !(0.0..=1.0).contains(&wastage_fraction) {
            return Err(QuantityError::FractionOutOfRange {
                fraction: wastage_fraction,
            });
        }
        let wastage_kg = round_kg(input_kg * wastage_fraction);
        Self::new(input_kg, round_kg(input_kg - wastage_kg), wastage_kg)
    }

    pub fn new(input_kg: f64, output_kg: f64, wastage_kg: f64) -> Result<Self, QuantityError> {
        for value in [input_kg, output_kg, wastage_kg] {
            if !value.is_finite() {
                return Err(QuantityError::NotFinite);
            }
            if value < 0.0 {
                return Err(QuantityError::Negative { value });
            }
        }
        if wastage_kg > input_kg {
            return Err(QuantityError::WastageExceedsInput {
                wastage: wastage_kg,
                input: input_kg,
            });
        }
        if (output_kg + wastage_kg - input_kg).abs() >= 0.01 {
            return Err(QuantityError::Unbalanced {
                input: input_kg,
                output: output_kg,
                wastage: wastage_kg,
            });
        }
        Ok(Self {
            input_kg,
            output_kg,
            wastage_kg,
        })
    }
}
