use processor::ApiContext;
use shared::protocol::FloorEvent;
use tokio::sync::broadcast;

use crate::simulator::Simulator;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) events: broadcast::Sender<FloorEvent>,
    pub(crate) simulator: std::sync::Arc<Simulator>,
}
