use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use shared::domain::{BatchId, StationId};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (BatchId, StationId);

/// One async lock per (batch, station) progress record. Transitions for the
/// same record run one at a time; different records never contend.
#[derive(Default)]
pub struct ProgressLocks {
    cells: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl ProgressLocks {
    pub async fn lock(&self, batch_id: BatchId, station_id: StationId) -> OwnedMutexGuard<()> {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            // A cell only the map references has no holder and no waiter.
            cells.retain(|_, cell| Arc::strong_count(cell) > 1);
            Arc::clone(cells.entry((batch_id, station_id)).or_default())
        };
        cell.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
