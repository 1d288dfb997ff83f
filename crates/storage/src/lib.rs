use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, QueryBuilder, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub mod patch;
pub mod query;
pub mod records;
pub mod seed;
pub mod store;
mod transient;

pub use patch::{BatchPatch, CommandLogPatch, ProgressPatch, StationPatch, WorkerPatch};
pub use query::{Condition, FieldValue, Filter, Order, Query};
pub use records::Record;
pub use seed::{seed_demo_floor, SeedSummary};
pub use store::{NewActivity, NewAlert, NewBatch, NewCommandLog, NewWorker, ProgressStore};
pub use transient::is_transient;

use patch::Assignments;
use records::ensure_column;

/// SQLite-backed floor store.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = if is_memory_url(database_url) {
            // An in-memory database is dropped with its last connection.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub(crate) async fn select<R: Record>(&self, query: &Query) -> Result<Vec<R>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM {}", column_list::<R>(), R::TABLE));
        push_filter::<R>(&mut builder, &query.filter)?;
        match query.order {
            Some(order) => {
                ensure_column::<R>(order.field)?;
                let direction = if order.descending { "DESC" } else { "ASC" };
                builder.push(format!(
                    " ORDER BY \"{}\" {direction}, rowid {direction}",
                    order.field
                ));
            }
            None => {
                builder.push(" ORDER BY rowid");
            }
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to query {}", R::TABLE))?;
        rows.iter().map(R::from_row).collect()
    }

    pub(crate) async fn update<R: Record>(
        &self,
        filter: &Filter,
        assignments: Assignments,
    ) -> Result<Vec<R>> {
        if assignments.is_empty() {
            return self.select(&Query::from(filter.clone())).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", R::TABLE));
        for (idx, (field, value)) in assignments.iter().enumerate() {
            ensure_column::<R>(field)?;
            if idx > 0 {
                builder.push(", ");
            }
            builder.push(format!("\"{field}\" = "));
            push_value(&mut builder, value);
        }
        push_filter::<R>(&mut builder, filter)?;
        builder.push(format!(" RETURNING {}", column_list::<R>()));

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to update {}", R::TABLE))?;
        rows.iter().map(R::from_row).collect()
    }
}

/// True when the failure is a uniqueness constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db_err| db_err.is_unique_violation())
    })
}

pub(crate) fn column_list<R: Record>() -> String {
    R::COLUMNS
        .iter()
        .map(|column| format!("\"{column}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_filter<R: Record>(builder: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) -> Result<()> {
    for (idx, (field, condition)) in filter.conditions.iter().enumerate() {
        ensure_column::<R>(field)?;
        builder.push(if idx == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::Eq(FieldValue::Null) => {
                builder.push(format!("\"{field}\" IS NULL"));
            }
            Condition::Eq(value) => {
                builder.push(format!("\"{field}\" = "));
                push_value(builder, value);
            }
            Condition::Gte(value) => {
                builder.push(format!("\"{field}\" >= "));
                push_value(builder, value);
            }
            Condition::In(values) if values.is_empty() => {
                builder.push("0 = 1");
            }
            Condition::In(values) => {
                builder.push(format!("\"{field}\" IN ("));
                for (pos, value) in values.iter().enumerate() {
                    if pos > 0 {
                        builder.push(", ");
                    }
                    push_value(builder, value);
                }
                builder.push(")");
            }
        }
    }
    Ok(())
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &FieldValue) {
    match value.clone() {
        FieldValue::Null => builder.push("NULL"),
        FieldValue::Bool(v) => builder.push_bind(v),
        FieldValue::Int(v) => builder.push_bind(v),
        FieldValue::Real(v) => builder.push_bind(v),
        FieldValue::Text(v) => builder.push_bind(v),
        FieldValue::Timestamp(v) => builder.push_bind(v),
        FieldValue::Date(v) => builder.push_bind(v),
    };
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;
    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
