//! PostgreSQL and Redis bootstrap shared by all services

use std::time::Duration;

use redis::aio::ConnectionManager;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseConfig, RedisConfig};

pub use sqlx::types::Decimal;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Open the connection pool.
pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect(&config.url)
        .await?;

    info!(max_connections = config.max_connections, "Database connection pool established");
    Ok(pool)
}

/// Apply the workspace migrations. sqlx takes an advisory lock, so every
/// service can call this on start-up.
pub async fn migrate(pool: &PgPool) -> DatabaseResult<()> {
    sqlx::migrate!("../migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

pub async fn connect_redis(config: &RedisConfig) -> DatabaseResult<ConnectionManager> {
    let client = redis::Client::open(config.url.clone())?;
    let conn = client.get_connection_manager().await?;
    info!("Redis connection established");
    Ok(conn)
}

/// Cheap liveness probe used by the health endpoints.
pub async fn ping(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
