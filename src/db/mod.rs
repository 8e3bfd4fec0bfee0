use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

/// Schema files, applied in order. Every statement is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_init.sql",
    include_str!("../../migrations/0001_init.sql"),
)];

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let url = normalize_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&url)
        .with_context(|| format!("invalid DATABASE_URL '{url}'"))?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database at {url}"))?;
    Ok(pool)
}

/// Single-connection pool over a private in-memory database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Transaction that takes the write lock at `BEGIN`; reads inside it never need a lock upgrade.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .with_context(|| format!("migration {name} failed"))?;
        tracing::debug!(migration = name, "applied");
    }
    Ok(())
}

fn normalize_sqlite_url(input: &str) -> String {
    // Accept forms: sqlite:foo.db, sqlite://foo.db, file:foo.db, or a bare path
    if input.starts_with("sqlite://") || input.starts_with("sqlite::memory:") {
        return input.to_string();
    }
    if let Some(rest) = input.strip_prefix("sqlite:") {
        return format!("sqlite://{}", rest.trim_start_matches('/'));
    }
    if let Some(rest) = input.strip_prefix("file:") {
        return format!("sqlite://{rest}");
    }
    format!("sqlite://{input}")
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
