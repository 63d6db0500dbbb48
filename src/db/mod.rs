// src/db/mod.rs
// Connection pool setup and the migration runner.

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::database::DatabaseConfig;

pub type Pool = PgPool;
pub type Tx<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// Every data-layer operation is generic over its executor: call it with
/// `&pool` to run standalone, or with `&mut *tx` to bind it into a caller's
/// transaction so a job's side effects and its own completion record
/// commit atomically.
pub trait Db<'c>: sqlx::PgExecutor<'c> {}
impl<'c, T> Db<'c> for T where T: sqlx::PgExecutor<'c> {}

/// Connects to the configured database and runs pending migrations.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Pool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;

    info!("running migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
