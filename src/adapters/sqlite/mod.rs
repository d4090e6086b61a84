//! SQLite persistence for refinement sessions.

pub mod analysis_store;
pub mod connection;
pub mod migrations;

pub use analysis_store::SqliteAnalysisStore;
pub use connection::{create_pool, create_test_pool, database_url, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};

use sqlx::SqlitePool;

use crate::domain::models::DatabaseConfig;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

pub async fn initialize_database(database_url: &str, config: Option<PoolConfig>) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, config).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

/// Open (creating if needed) and migrate the configured database.
pub async fn initialize_from_config(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    initialize_database(&database_url(&config.path), Some(PoolConfig::from(config))).await
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
