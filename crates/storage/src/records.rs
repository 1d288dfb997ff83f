use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use shared::domain::{
    ActivityId, Alert, AlertId, Batch, BatchId, CommandLogId, ProgressId, Station,
    StationProgress, VoiceCommandLog, Worker, WorkerActivity, WorkerRecordId,
};
use sqlx::{sqlite::SqliteRow, Row};

/// A typed row of one stored collection.
pub trait Record: Sized + Send + Unpin + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &SqliteRow) -> Result<Self>;
}

pub(crate) fn ensure_column<R: Record>(field: &str) -> Result<()> {
    if R::COLUMNS.contains(&field) {
        Ok(())
    } else {
        Err(anyhow!("unknown field '{field}' on {}", R::TABLE))
    }
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .with_context(|| format!("invalid value in column '{column}'"))
}

fn parse_optional_column<T>(row: &SqliteRow, column: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        value
            .parse()
            .with_context(|| format!("invalid value in column '{column}'"))
    })
    .transpose()
}

impl Record for Batch {
    const TABLE: &'static str = "batches";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "batch_number",
        "product_name",
        "start_date",
        "end_date",
        "target_quantity_kg",
        "raw_material_kg",
        "current_quantity_kg",
        "current_station",
        "overall_status",
        "created_at",
    ];

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: BatchId(row.try_get("id")?),
            batch_number: row.try_get("batch_number")?,
            product_name: row.try_get("product_name")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            target_quantity_kg: row.try_get("target_quantity_kg")?,
            raw_material_kg: row.try_get("raw_material_kg")?,
            current_quantity_kg: row.try_get("current_quantity_kg")?,
            current_station: parse_column(row, "current_station")?,
            overall_status: parse_column(row, "overall_status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Record for StationProgress {
    const TABLE: &'static str = "station_progress";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "batch_id",
        "station_id",
        "status",
        "input_quantity_kg",
        "output_quantity_kg",
        "wastage_kg",
        "workers_assigned",
        "start_time",
        "end_time",
        "created_at",
    ];

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: ProgressId(row.try_get("id")?),
            batch_id: BatchId(row.try_get("batch_id")?),
            station_id: parse_column(row, "station_id")?,
            status: parse_column(row, "status")?,
            input_quantity_kg: row.try_get("input_quantity_kg")?,
            output_quantity_kg: row.try_get("output_quantity_kg")?,
            wastage_kg: row.try_get("wastage_kg")?,
            workers_assigned: row.try_get("workers_assigned")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Record for Station {
    const TABLE: &'static str = "stations";
    const COLUMNS: &'static [&'static str] =
        &["station_id", "station_name", "capacity", "current_status"];

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            station_id: parse_column(row, "station_id")?,
            station_name: row.try_get("station_name")?,
            capacity: row.try_get("capacity")?,
            current_status: parse_column(row, "current_status")?,
        })
    }
}

impl Record for Worker {
    const TABLE: &'static str = "workers";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "worker_id",
        "worker_name",
        "station_id",
        "productivity_score",
        "total_tasks_completed",
        "is_active",
        "created_at",
    ];

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: WorkerRecordId(row.try_get("id")?),
            worker_id: row.try_get("worker_id")?,
            worker_name: row.try_get("worker_name")?,
            station_id: parse_column(row, "station_id")?,
            productivity_score: row.try_get("productivity_score")?,
            total_tasks_completed: row.try_get("total_tasks_completed")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Record for WorkerActivity {
    const TABLE: &'static str = "worker_activity";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "worker_id",
        "station_id",
        "activity_type",
        "description",
        "batch_number",
        "created_at",
    ];

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: ActivityId(row.try_get("id")?),
            worker_id: row.try_get("worker_id")?,
            station_id: parse_column(row, "station_id")?,
            activity_type: parse_column(row, "activity_type")?,
            description: row.try_get("description")?,
            batch_number: row.try_get("batch_number")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Record for VoiceCommandLog {
    const TABLE: &'static str = "voice_commands";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "worker_id",
        "station_id",
        "raw_command",
        "parsed_action",
        "parsed_entity",
        "batch_number",
        "processed",
        "timestamp",
    ];

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: CommandLogId(row.try_get("id")?),
            worker_id: row.try_get("worker_id")?,
            station_id: parse_column(row, "station_id")?,
            raw_command: row.try_get("raw_command")?,
            parsed_action: parse_optional_column(row, "parsed_action")?,
            parsed_entity: row.try_get("parsed_entity")?,
            batch_number: row.try_get("batch_number")?,
            processed: row.try_get("processed")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

impl Record for Alert {
    const TABLE: &'static str = "alerts";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "alert_type",
        "severity",
        "station_id",
        "batch_id",
        "message",
        "is_resolved",
        "created_at",
    ];

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let batch_id: Option<i64> = row.try_get("batch_id")?;
        Ok(Self {
            id: AlertId(row.try_get("id")?),
            alert_type: parse_column(row, "alert_type")?,
            severity: parse_column(row, "severity")?,
            station_id: parse_column(row, "station_id")?,
            batch_id: batch_id.map(BatchId),
            message: row.try_get("message")?,
            is_resolved: row.try_get("is_resolved")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
