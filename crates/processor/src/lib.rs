use std::sync::Arc;

use shared::error::{ApiError, ErrorCode};
use storage::ProgressStore;

pub mod catalog;
pub mod ingest;
pub mod locks;
pub mod processor;
pub mod projections;
pub mod retry;

pub use processor::{CommandProcessor, FloorCommand, ProcessingResult};
pub use retry::{retry, with_retry, RetryFailure, RetryPolicy};

/// Default price of one kilogram of wasted material.
pub const DEFAULT_WASTAGE_COST_PER_KG: f64 = 50.0;

#[derive(Clone)]
pub struct ApiContext {
    pub processor: Arc<CommandProcessor>,
    pub wastage_cost_per_kg: f64,
}

impl ApiContext {
    pub fn new(processor: CommandProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
            wastage_cost_per_kg: DEFAULT_WASTAGE_COST_PER_KG,
        }
    }

    pub fn with_wastage_cost(mut self, cost_per_kg: f64) -> Self {
        self.wastage_cost_per_kg = cost_per_kg;
        self
    }

    pub fn store(&self) -> &dyn ProgressStore {
        self.processor.store().as_ref()
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
