//! Typed partial updates. `None` leaves a field untouched.

use chrono::{DateTime, Utc};
use shared::domain::{BatchStatus, ProgressStatus, StationId, StationStatus};

use crate::query::FieldValue;

pub type Assignments = Vec<(&'static str, FieldValue)>;

fn push<T: Into<FieldValue>>(out: &mut Assignments, field: &'static str, value: Option<T>) {
    if let Some(value) = value {
        out.push((field, value.into()));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPatch {
    pub current_quantity_kg: Option<f64>,
    pub current_station: Option<StationId>,
    pub overall_status: Option<BatchStatus>,
}

impl BatchPatch {
    pub fn assignments(&self) -> Assignments {
        let mut out = Vec::new();
        push(&mut out, "current_quantity_kg", self.current_quantity_kg);
        push(&mut out, "current_station", self.current_station);
        push(&mut out, "overall_status", self.overall_status);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressPatch {
    pub status: Option<ProgressStatus>,
    pub input_quantity_kg: Option<f64>,
    pub output_quantity_kg: Option<f64>,
    pub wastage_kg: Option<f64>,
    pub workers_assigned: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Clears `end_time` and output figures, used when work restarts.
    pub reopen: bool,
}

impl ProgressPatch {
    pub fn assignments(&self) -> Assignments {
        let mut out = Vec::new();
        push(&mut out, "status", self.status);
        push(&mut out, "input_quantity_kg", self.input_quantity_kg);
        push(&mut out, "output_quantity_kg", self.output_quantity_kg);
        push(&mut out, "wastage_kg", self.wastage_kg);
        push(&mut out, "workers_assigned", self.workers_assigned);
        push(&mut out, "start_time", self.start_time);
        push(&mut out, "end_time", self.end_time);
        if self.reopen {
            out.push(("end_time", FieldValue::Null));
            out.push(("output_quantity_kg", FieldValue::Null));
            out.push(("wastage_kg", FieldValue::Null));
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationPatch {
    pub current_status: Option<StationStatus>,
}

impl StationPatch {
    pub fn status(status: StationStatus) -> Self {
        Self {
            current_status: Some(status),
        }
    }

    pub fn assignments(&self) -> Assignments {
        let mut out = Vec::new();
        push(&mut out, "current_status", self.current_status);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerPatch {
    pub station_id: Option<StationId>,
    pub productivity_score: Option<f64>,
    pub is_active: Option<bool>,
}

impl WorkerPatch {
    pub fn assignments(&self) -> Assignments {
        let mut out = Vec::new();
        push(&mut out, "station_id", self.station_id);
        push(&mut out, "productivity_score", self.productivity_score);
        push(&mut out, "is_active", self.is_active);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandLogPatch {
    pub processed: Option<bool>,
}

impl CommandLogPatch {
    pub fn assignments(&self) -> Assignments {
        let mut out = Vec::new();
        push(&mut out, "processed", self.processed);
        out
    }
}
