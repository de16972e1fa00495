//! Database layer for vestibule.

pub mod entities;
pub mod migrations;
pub mod repositories;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::log::LevelFilter;
use vestibule_common::{AppError, Config};

/// Initialize the leader database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    connect(&config.database.url, config).await
}

/// Initialize the optional replica connection for follower reads.
pub async fn init_replica(config: &Config) -> Result<Option<DatabaseConnection>, AppError> {
    match &config.database.replica_url {
        Some(url) => Ok(Some(connect(url, config).await?)),
        None => Ok(None),
    }
}

async fn connect(url: &str, config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
