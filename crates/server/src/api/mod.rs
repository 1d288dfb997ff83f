//! HTTP handlers. Each one unpacks the request, calls the matching
//! `processor` operation and maps `ApiError` codes onto status codes.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    async_trait,
    extract::{ws::WebSocket, FromRequest, Path, Query, Request, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use processor::{catalog, ingest, projections};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{Alert, Batch, BatchId, Station, StationId, VoiceCommandLog, Worker},
    error::{ApiError, ErrorCode},
    protocol::{
        BatchProgressResponse, CostAnalysis, CreateBatchRequest, LocationUpdateRequest,
        LocationUpdateResponse, OwnerDashboard, ProductionStats, ProductivityReport,
        SimulatorStatus, StationStatusResponse, StationStatusUpdate, StationWastage,
        SubmitCommandRequest, SubmitCommandResponse, TimelineEntry,
    },
};
use tracing::{debug, error};

use crate::app_state::AppState;

pub(crate) type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<Json<T>, HttpError>;

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> HttpError {
    if err.code == ErrorCode::Internal {
        error!(error = %err.message, "request failed");
    }
    (status_for(err.code), Json(err))
}

/// JSON body whose rejections use the `ApiError` shape with 400.
pub(crate) struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let message = rejection.body_text();
                debug!(error = %message, "request body rejected");
                Err((StatusCode::BAD_REQUEST, Json(ApiError::validation(message))))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentCommandsQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertsQuery {
    #[serde(default)]
    unresolved_only: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimelineQuery {
    batch_number: Option<String>,
}

pub(crate) async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.store().health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

pub(crate) async fn http_submit_command(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SubmitCommandRequest>,
) -> HttpResult<SubmitCommandResponse> {
    let response = ingest::submit_command(&state.api, req)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

pub(crate) async fn http_recent_commands(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RecentCommandsQuery>,
) -> HttpResult<Vec<VoiceCommandLog>> {
    let commands = ingest::list_recent_commands(&state.api, q.limit)
        .await
        .map_err(reject)?;
    Ok(Json(commands))
}

/// The path id wins over the body's `worker_id`.
pub(crate) async fn http_update_worker_location(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
    JsonBody(req): JsonBody<LocationUpdateRequest>,
) -> HttpResult<LocationUpdateResponse> {
    if req.worker_id != worker_id {
        debug!(path = %worker_id, body = %req.worker_id, "location body names another worker");
    }
    let response = ingest::update_worker_location(&state.api, &worker_id, req.station_id)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

pub(crate) async fn http_list_workers(State(state): State<Arc<AppState>>) -> HttpResult<Vec<Worker>> {
    Ok(Json(catalog::list_workers(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_get_worker(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> HttpResult<Worker> {
    let worker = catalog::get_worker(&state.api, &worker_id)
        .await
        .map_err(reject)?;
    Ok(Json(worker))
}

pub(crate) async fn http_create_batch(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateBatchRequest>,
) -> HttpResult<Batch> {
    let batch = catalog::create_batch(&state.api, req)
        .await
        .map_err(reject)?;
    Ok(Json(batch))
}

pub(crate) async fn http_list_batches(State(state): State<Arc<AppState>>) -> HttpResult<Vec<Batch>> {
    Ok(Json(catalog::list_batches(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_get_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<i64>,
) -> HttpResult<Batch> {
    let batch = catalog::get_batch(&state.api, BatchId(batch_id))
        .await
        .map_err(reject)?;
    Ok(Json(batch))
}

pub(crate) async fn http_batch_progress(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<i64>,
) -> HttpResult<BatchProgressResponse> {
    let progress = catalog::batch_progress(&state.api, BatchId(batch_id))
        .await
        .map_err(reject)?;
    Ok(Json(progress))
}

pub(crate) async fn http_list_stations(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Vec<Station>> {
    Ok(Json(catalog::list_stations(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_get_station(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<StationId>,
) -> HttpResult<Station> {
    let station = catalog::get_station(&state.api, station_id)
        .await
        .map_err(reject)?;
    Ok(Json(station))
}

pub(crate) async fn http_station_workers(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<StationId>,
) -> HttpResult<Vec<Worker>> {
    let workers = catalog::station_workers(&state.api, station_id)
        .await
        .map_err(reject)?;
    Ok(Json(workers))
}

pub(crate) async fn http_update_station_status(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<StationId>,
    JsonBody(update): JsonBody<StationStatusUpdate>,
) -> HttpResult<StationStatusResponse> {
    let response = catalog::update_station_status(&state.api, station_id, update.status)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

pub(crate) async fn http_list_alerts(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AlertsQuery>,
) -> HttpResult<Vec<Alert>> {
    let alerts = catalog::list_alerts(&state.api, q.unresolved_only)
        .await
        .map_err(reject)?;
    Ok(Json(alerts))
}

pub(crate) async fn http_owner_dashboard(
    State(state): State<Arc<AppState>>,
) -> HttpResult<OwnerDashboard> {
    Ok(Json(projections::owner_dashboard(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_production_stats(
    State(state): State<Arc<AppState>>,
) -> HttpResult<ProductionStats> {
    Ok(Json(projections::production_stats(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_productivity(
    State(state): State<Arc<AppState>>,
) -> HttpResult<ProductivityReport> {
    Ok(Json(projections::productivity(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_wastage(
    State(state): State<Arc<AppState>>,
) -> HttpResult<BTreeMap<StationId, StationWastage>> {
    Ok(Json(projections::wastage(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_timeline(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TimelineQuery>,
) -> HttpResult<Vec<TimelineEntry>> {
    let batch_number = q.batch_number.as_deref().filter(|n| !n.trim().is_empty());
    let timeline = projections::timeline(&state.api, batch_number)
        .await
        .map_err(reject)?;
    Ok(Json(timeline))
}

pub(crate) async fn http_costs(State(state): State<Arc<AppState>>) -> HttpResult<CostAnalysis> {
    Ok(Json(projections::costs(&state.api).await.map_err(reject)?))
}

pub(crate) async fn http_simulator_run(
    State(state): State<Arc<AppState>>,
) -> Json<SimulatorStatus> {
    Json(state.simulator.start().await)
}

pub(crate) async fn http_simulator_stop(
    State(state): State<Arc<AppState>>,
) -> Json<SimulatorStatus> {
    Json(state.simulator.stop().await)
}

pub(crate) async fn http_simulator_status(
    State(state): State<Arc<AppState>>,
) -> Json<SimulatorStatus> {
    Json(state.simulator.status().await)
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

/// Streams every floor event to one dashboard until it disconnects.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};
    use tokio::sync::broadcast::error::RecvError;

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "dashboard fell behind the event stream");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
