use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use processor::{catalog, ingest, ApiContext, CommandProcessor};
use serde_json::to_string_pretty;
use shared::{
    domain::StationId,
    protocol::{CreateBatchRequest, SubmitCommandRequest},
};
use storage::{seed_demo_floor, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "floorctl", about = "Operator tools for the production floor tracker")]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/floor.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how a phrase would be read, without touching the database.
    Parse {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Fill an empty database with the demo roster and batch.
    Seed,
    CreateBatch {
        batch_number: String,
        #[arg(long)]
        target_kg: f64,
        #[arg(long)]
        raw_kg: f64,
        #[arg(long, default_value = "ABC Powder")]
        product_name: String,
        /// Defaults to today.
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Defaults to the start date.
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },
    Submit {
        worker_id: String,
        station_id: StationId,
        text: String,
        #[arg(long)]
        batch_number: Option<String>,
    },
    Recent {
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    if let Command::Parse { text } = &cli.command {
        let intent = voice_parser::parse(&text.join(" "));
        println!("{}", to_string_pretty(&intent)?);
        return Ok(());
    }

    let storage = Storage::new(&cli.database_url).await?;
    if let Command::Seed = cli.command {
        let summary = seed_demo_floor(&storage).await?;
        println!(
            "seeded workers={} demo_batch={}",
            summary.workers_created, summary.batch_created
        );
        return Ok(());
    }

    let ctx = ApiContext::new(CommandProcessor::new(Arc::new(storage)));
    match cli.command {
        Command::CreateBatch {
            batch_number,
            target_kg,
            raw_kg,
            product_name,
            start_date,
            end_date,
        } => {
            let start_date = start_date.unwrap_or_else(|| Utc::now().date_naive());
            let batch = catalog::create_batch(
                &ctx,
                CreateBatchRequest {
                    batch_number,
                    product_name,
                    start_date,
                    end_date: end_date.unwrap_or(start_date),
                    target_quantity_kg: target_kg,
                    raw_material_kg: raw_kg,
                },
            )
            .await
            .map_err(|e| anyhow!(e))?;
            println!("created batch_id={} batch_number={}", batch.id.0, batch.batch_number);
        }
        Command::Submit {
            worker_id,
            station_id,
            text,
            batch_number,
        } => {
            let response = ingest::submit_command(
                &ctx,
                SubmitCommandRequest {
                    worker_id,
                    station_id,
                    raw_command: text,
                    batch_number,
                },
            )
            .await
            .map_err(|e| anyhow!(e))?;
            println!("{}", to_string_pretty(&response)?);
        }
        Command::Recent { limit } => {
            let commands = ingest::list_recent_commands(&ctx, limit)
                .await
                .map_err(|e| anyhow!(e))?;
            for entry in commands {
                println!(
                    "{} {} {} {:<8} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.worker_id,
                    entry.station_id,
                    entry.parsed_action.map(|a| a.as_str()).unwrap_or("-"),
                    entry.raw_command
                );
            }
        }
        Command::Parse { .. } | Command::Seed => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_parses_station_and_optional_batch() {
        let cli = Cli::try_parse_from([
            "floorctl",
            "submit",
            "WORKER_201",
            "STATION_2",
            "Starting washing",
            "--batch-number",
            "BATCH_001",
        ])
        .expect("cli");
        match cli.command {
            Command::Submit {
                station_id,
                batch_number,
                ..
            } => {
                assert_eq!(station_id, StationId::Station2);
                assert_eq!(batch_number.as_deref(), Some("BATCH_001"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_station_is_rejected() {
        let result = Cli::try_parse_from(["floorctl", "submit", "W", "STATION_0", "Starting"]);
        assert!(result.is_err());
    }

    #[test]
    fn create_batch_takes_dates() {
        let cli = Cli::try_parse_from([
            "floorctl",
            "--database-url",
            "sqlite::memory:",
            "create-batch",
            "BATCH_009",
            "--target-kg",
            "150",
            "--raw-kg",
            "200",
            "--start-date",
            "2026-10-19",
        ])
        .expect("cli");
        assert_eq!(cli.database_url, "sqlite::memory:");
        match cli.command {
            Command::CreateBatch {
                start_date,
                end_date,
                product_name,
                ..
            } => {
                assert_eq!(start_date, NaiveDate::from_ymd_opt(2026, 10, 19));
                assert!(end_date.is_none());
                assert_eq!(product_name, "ABC Powder");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
