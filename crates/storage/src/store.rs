use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use shared::domain::{
    ActivityType, Alert, AlertSeverity, AlertType, Batch, BatchId, BatchStatus, CommandAction,
    ProgressStatus, Station, StationId, StationProgress, VoiceCommandLog, Worker, WorkerActivity,
};

use crate::{
    column_list,
    patch::{BatchPatch, CommandLogPatch, ProgressPatch, StationPatch, WorkerPatch},
    query::{Filter, Query},
    records::Record,
    Storage,
};

#[derive(Debug, Clone)]
pub struct NewBatch {
    pub batch_number: String,
    pub product_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_quantity_kg: f64,
    pub raw_material_kg: f64,
}

#[derive(Debug, Clone)]
pub struct NewWorker {
    pub worker_id: String,
    pub worker_name: String,
    pub station_id: StationId,
    pub productivity_score: f64,
    pub total_tasks_completed: i64,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub worker_id: String,
    pub station_id: StationId,
    pub activity_type: ActivityType,
    pub description: String,
    pub batch_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCommandLog {
    pub worker_id: String,
    pub station_id: StationId,
    pub raw_command: String,
    pub parsed_action: Option<CommandAction>,
    pub parsed_entity: Option<String>,
    pub batch_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub station_id: StationId,
    pub batch_id: Option<BatchId>,
    pub message: String,
}

/// Persistence boundary for floor state.
///
/// Inserts assign the identifier and creation timestamp. Updates apply a patch
/// to every record matching the filter and return the updated records; an
/// empty result means nothing matched and is not an error.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Inserts the batch header and one pending progress record per station
    /// atomically.
    async fn create_batch(&self, batch: NewBatch) -> Result<Batch>;
    async fn batches(&self, query: Query) -> Result<Vec<Batch>>;
    async fn update_batches(&self, filter: Filter, patch: BatchPatch) -> Result<Vec<Batch>>;

    async fn progress(&self, query: Query) -> Result<Vec<StationProgress>>;
    async fn update_progress(
        &self,
        filter: Filter,
        patch: ProgressPatch,
    ) -> Result<Vec<StationProgress>>;

    async fn stations(&self, query: Query) -> Result<Vec<Station>>;
    async fn update_stations(&self, filter: Filter, patch: StationPatch) -> Result<Vec<Station>>;

    async fn insert_worker(&self, worker: NewWorker) -> Result<Worker>;
    async fn workers(&self, query: Query) -> Result<Vec<Worker>>;
    async fn update_workers(&self, filter: Filter, patch: WorkerPatch) -> Result<Vec<Worker>>;
    /// Adds one to the worker's completed-task counter.
    async fn credit_task_completed(&self, worker_id: &str) -> Result<Option<Worker>>;

    async fn insert_activity(&self, activity: NewActivity) -> Result<WorkerActivity>;
    async fn activities(&self, query: Query) -> Result<Vec<WorkerActivity>>;

    async fn insert_command_log(&self, log: NewCommandLog) -> Result<VoiceCommandLog>;
    async fn command_logs(&self, query: Query) -> Result<Vec<VoiceCommandLog>>;
    async fn update_command_logs(
        &self,
        filter: Filter,
        patch: CommandLogPatch,
    ) -> Result<Vec<VoiceCommandLog>>;

    async fn insert_alert(&self, alert: NewAlert) -> Result<Alert>;
    async fn alerts(&self, query: Query) -> Result<Vec<Alert>>;

    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
impl ProgressStore for Storage {
    async fn create_batch(&self, batch: NewBatch) -> Result<Batch> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        let sql = format!(
            "INSERT INTO batches
             (batch_number, product_name, start_date, end_date, target_quantity_kg,
              raw_material_kg, current_quantity_kg, current_station, overall_status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
             RETURNING {}",
            column_list::<Batch>()
        );
        let row = sqlx::query(&sql)
            .bind(&batch.batch_number)
            .bind(&batch.product_name)
            .bind(batch.start_date)
            .bind(batch.end_date)
            .bind(batch.target_quantity_kg)
            .bind(batch.raw_material_kg)
            .bind(StationId::RECEIVING.as_str())
            .bind(BatchStatus::NotStarted.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("failed to insert batch '{}'", batch.batch_number))?;
        let created = Batch::from_row(&row)?;

        for station in StationId::ALL {
            sqlx::query(
                "INSERT INTO station_progress (batch_id, station_id, status, workers_assigned, created_at)
                 VALUES (?, ?, ?, 0, ?)",
            )
            .bind(created.id.0)
            .bind(station.as_str())
            .bind(ProgressStatus::Pending.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert progress for {station}"))?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn batches(&self, query: Query) -> Result<Vec<Batch>> {
        self.select(&query).await
    }

    async fn update_batches(&self, filter: Filter, patch: BatchPatch) -> Result<Vec<Batch>> {
        self.update(&filter, patch.assignments()).await
    }

    async fn progress(&self, query: Query) -> Result<Vec<StationProgress>> {
        self.select(&query).await
    }

    async fn update_progress(
        &self,
        filter: Filter,
        patch: ProgressPatch,
    ) -> Result<Vec<StationProgress>> {
        self.update(&filter, patch.assignments()).await
    }

    async fn stations(&self, query: Query) -> Result<Vec<Station>> {
        self.select(&query).await
    }

    async fn update_stations(&self, filter: Filter, patch: StationPatch) -> Result<Vec<Station>> {
        self.update(&filter, patch.assignments()).await
    }

    async fn insert_worker(&self, worker: NewWorker) -> Result<Worker> {
        let sql = format!(
            "INSERT INTO workers
             (worker_id, worker_name, station_id, productivity_score, total_tasks_completed, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, 1, ?)
             RETURNING {}",
            column_list::<Worker>()
        );
        let row = sqlx::query(&sql)
            .bind(&worker.worker_id)
            .bind(&worker.worker_name)
            .bind(worker.station_id.as_str())
            .bind(worker.productivity_score)
            .bind(worker.total_tasks_completed)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
            .with_context(|| format!("failed to insert worker '{}'", worker.worker_id))?;
        Worker::from_row(&row)
    }

    async fn workers(&self, query: Query) -> Result<Vec<Worker>> {
        self.select(&query).await
    }

    async fn update_workers(&self, filter: Filter, patch: WorkerPatch) -> Result<Vec<Worker>> {
        self.update(&filter, patch.assignments()).await
    }

    async fn credit_task_completed(&self, worker_id: &str) -> Result<Option<Worker>> {
        let sql = format!(
            "UPDATE workers SET total_tasks_completed = total_tasks_completed + 1
             WHERE worker_id = ?
             RETURNING {}",
            column_list::<Worker>()
        );
        let row = sqlx::query(&sql)
            .bind(worker_id)
            .fetch_optional(self.pool())
            .await
            .with_context(|| format!("failed to credit worker '{worker_id}'"))?;
        row.as_ref().map(Worker::from_row).transpose()
    }

    async fn insert_activity(&self, activity: NewActivity) -> Result<WorkerActivity> {
        let sql = format!(
            "INSERT INTO worker_activity
             (worker_id, station_id, activity_type, description, batch_number, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {}",
            column_list::<WorkerActivity>()
        );
        let row = sqlx::query(&sql)
            .bind(&activity.worker_id)
            .bind(activity.station_id.as_str())
            .bind(activity.activity_type.as_str())
            .bind(&activity.description)
            .bind(&activity.batch_number)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
            .context("failed to insert worker activity")?;
        WorkerActivity::from_row(&row)
    }

    async fn activities(&self, query: Query) -> Result<Vec<WorkerActivity>> {
        self.select(&query).await
    }

    async fn insert_command_log(&self, log: NewCommandLog) -> Result<VoiceCommandLog> {
        let sql = format!(
            "INSERT INTO voice_commands
             (worker_id, station_id, raw_command, parsed_action, parsed_entity, batch_number, processed, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)
             RETURNING {}",
            column_list::<VoiceCommandLog>()
        );
        let row = sqlx::query(&sql)
            .bind(&log.worker_id)
            .bind(log.station_id.as_str())
            .bind(&log.raw_command)
            .bind(log.parsed_action.map(|action| action.as_str()))
            .bind(&log.parsed_entity)
            .bind(&log.batch_number)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
            .context("failed to insert voice command log")?;
        VoiceCommandLog::from_row(&row)
    }

    async fn command_logs(&self, query: Query) -> Result<Vec<VoiceCommandLog>> {
        self.select(&query).await
    }

    async fn update_command_logs(
        &self,
        filter: Filter,
        patch: CommandLogPatch,
    ) -> Result<Vec<VoiceCommandLog>> {
        self.update(&filter, patch.assignments()).await
    }

    async fn insert_alert(&self, alert: NewAlert) -> Result<Alert> {
        let sql = format!(
            "INSERT INTO alerts
             (alert_type, severity, station_id, batch_id, message, is_resolved, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)
             RETURNING {}",
            column_list::<Alert>()
        );
        let row = sqlx::query(&sql)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(alert.station_id.as_str())
            .bind(alert.batch_id.map(|id| id.0))
            .bind(&alert.message)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
            .context("failed to insert alert")?;
        Alert::from_row(&row)
    }

    async fn alerts(&self, query: Query) -> Result<Vec<Alert>> {
        self.select(&query).await
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(self.pool())
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}
