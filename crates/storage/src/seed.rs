use anyhow::Result;
use chrono::Utc;
use shared::domain::StationId;

use crate::{
    query::Query,
    store::{NewBatch, NewWorker, ProgressStore},
};

pub const DEMO_BATCH_NUMBER: &str = "BATCH_001";

const WORKER_NAMES: &[&str] = &[
    "Ravi", "Arun", "Deepak", "Vijay", "Karthik", "Prakash", "Ramesh", "Sunil", "Anitha",
    "Priya", "Meena", "Lakshmi", "Kavitha", "Divya", "Radha", "Geetha", "Kumar", "Raj", "Mohan",
    "Ganesh", "Siva", "Bala", "Mani", "Senthil", "Veni", "Devi", "Prema", "Saranya", "Janaki",
    "Kamala", "Vasantha", "Mala", "Arjun", "Dinesh", "Naveen", "Prabhu", "Raghu", "Saravanan",
    "Thiru", "Vinod", "Bhavani", "Chitra", "Indira", "Jaya", "Kala", "Latha", "Mythili", "Nila",
    "Selvi", "Uma",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub workers_created: usize,
    pub batch_created: bool,
}

/// Floor worker id, e.g. `WORKER_203` for the third worker at station 2.
pub fn roster_worker_id(station: StationId, position: usize) -> String {
    format!("WORKER_{}{:02}", station.number(), position + 1)
}

/// Fills an empty floor with the default worker roster and the demo batch.
/// Safe to call on every start; existing data is left alone.
pub async fn seed_demo_floor<S>(store: &S) -> Result<SeedSummary>
where
    S: ProgressStore + ?Sized,
{
    let mut summary = SeedSummary::default();

    if store.workers(Query::all().limit(1)).await?.is_empty() {
        let mut index = 0usize;
        for station in StationId::ALL {
            for position in 0..station.default_worker_count() {
                store
                    .insert_worker(NewWorker {
                        worker_id: roster_worker_id(*station, position),
                        worker_name: WORKER_NAMES[index % WORKER_NAMES.len()].to_string(),
                        station_id: *station,
                        productivity_score: (60 + index % 30) as f64,
                        total_tasks_completed: (index * 5) as i64,
                    })
                    .await?;
                index += 1;
            }
        }
        summary.workers_created = index;
    }

    let existing = store
        .batches(Query::all().eq("batch_number", DEMO_BATCH_NUMBER))
        .await?;
    if existing.is_empty() {
        let today = Utc::now().date_naive();
        store
            .create_batch(NewBatch {
                batch_number: DEMO_BATCH_NUMBER.to_string(),
                product_name: "ABC Powder".to_string(),
                start_date: today,
                end_date: today,
                target_quantity_kg: 200.0,
                raw_material_kg: 270.0,
            })
            .await?;
        summary.batch_created = true;
    }

    Ok(summary)
}
