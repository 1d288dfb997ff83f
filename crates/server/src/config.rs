use std::{collections::HashMap, fs, str::FromStr, time::Duration};

use anyhow::Context;
use processor::RetryPolicy;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub seed_demo_data: bool,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub wastage_cost_per_kg: f64,
    pub simulator_tick_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8000".into(),
            database_url: "sqlite://./data/floor.db".into(),
            seed_demo_data: true,
            retry_max_attempts: 3,
            retry_base_delay_ms: 100,
            wastage_cost_per_kg: processor::DEFAULT_WASTAGE_COST_PER_KG,
            simulator_tick_ms: 1000,
        }
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn simulator_tick(&self) -> Duration {
        Duration::from_millis(self.simulator_tick_ms.max(1))
    }

    /// Applies one flat `key = value` override. Unknown keys are ignored.
    fn apply(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "bind_addr" | "server_bind" => self.server_bind = value.to_string(),
            "database_url" => self.database_url = value.to_string(),
            "seed_demo_data" => self.seed_demo_data = parse_value(key, value)?,
            "retry_max_attempts" => self.retry_max_attempts = parse_value(key, value)?,
            "retry_base_delay_ms" => self.retry_base_delay_ms = parse_value(key, value)?,
            "wastage_cost_per_kg" => self.wastage_cost_per_kg = parse_value(key, value)?,
            "simulator_tick_ms" => self.simulator_tick_ms = parse_value(key, value)?,
            _ => {}
        }
        Ok(())
    }
}

const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_BIND", "bind_addr"),
    ("APP__BIND_ADDR", "bind_addr"),
    ("DATABASE_URL", "database_url"),
    ("APP__DATABASE_URL", "database_url"),
    ("APP__SEED_DEMO_DATA", "seed_demo_data"),
    ("APP__RETRY_MAX_ATTEMPTS", "retry_max_attempts"),
    ("APP__RETRY_BASE_DELAY_MS", "retry_base_delay_ms"),
    ("APP__WASTAGE_COST_PER_KG", "wastage_cost_per_kg"),
    ("APP__SIMULATOR_TICK_MS", "simulator_tick_ms"),
];

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    let env: Vec<(&str, String)> = ENV_OVERRIDES
        .iter()
        .filter_map(|(var, key)| std::env::var(var).ok().map(|value| (*key, value)))
        .collect();
    resolve_settings(file.as_deref(), &env)
}

/// Defaults, then `server.toml`, then environment. A value that does not
/// parse is logged and the previous layer's value kept.
fn resolve_settings(file: Option<&str>, env: &[(&str, String)]) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                for (key, value) in &file_cfg {
                    let text = match value {
                        toml::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    if let Err(error) = settings.apply(key, &text) {
                        warn!(%error, "ignoring server.toml value");
                    }
                }
            }
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    for (key, value) in env {
        if let Err(error) = settings.apply(key, value) {
            warn!(%error, "ignoring environment override");
        }
    }

    settings
}

fn parse_value<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value '{value}' for {key}"))
}

/// Turns a bare path into a `sqlite://` URL; URLs pass through unchanged.
pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }
    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
