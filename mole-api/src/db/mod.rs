//! PostgreSQL access: pool setup, migrations and the typed operations the
//! handlers run. Listings go through [`Database::fetch`] with a composed
//! [`ListQuery`]; single-row reads and writes live in the entity modules.

mod accounts;
mod catalog;
mod lesions;
mod reports;
mod requests;

pub use lesions::LesionFields;
pub use reports::{diff_answers, AnswerDiff};

use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use tracing::instrument;

use crate::config::DatabaseConfig;
use crate::query::ListQuery;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.url)
        .await?;

    tracing::info!("Successfully connected to PostgreSQL");

    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check database health.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Foreign-key and check violations come from client-supplied ids.
fn write_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| match e {
        sqlx::Error::Database(ref db_err)
            if db_err.is_foreign_key_violation() || db_err.is_check_violation() =>
        {
            AppError::BadRequest(anyhow::anyhow!("{}: invalid reference", context))
        }
        other => AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, other)),
    }
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        health_check(&self.pool)
            .await
            .map_err(db_error("Health check failed"))
    }

    /// Run a composed listing and hand back the raw rows for decoding.
    #[instrument(skip(self, query))]
    pub async fn fetch(&self, query: &ListQuery) -> Result<Vec<PgRow>, AppError> {
        let mut builder = query.build();
        builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Unable to run the listing query"))
    }

    /// Run a composed listing and decode each row with `decode`.
    pub async fn list<T, F>(&self, query: &ListQuery, decode: F) -> Result<Vec<T>, AppError>
    where
        F: Fn(&PgRow, &ListQuery) -> Result<T, sqlx::Error>,
    {
        let rows = self.fetch(query).await?;
        rows.iter()
            .map(|row| decode(row, query))
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error("Unable to decode the listing"))
    }
}
