use std::str::FromStr;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;

use crate::cfg;

pub type DbPool = PgPool;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to parse database URL")]
    ConnectionStringError(#[from] sqlx::Error),

    #[error("Failed to connect to database")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Shared catalog migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

/// Row-level errors shared by the catalog and tenant store modules.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("User not found")]
    UserNotFound,

    #[error("Tenant not found")]
    TenantNotFound,
}

pub async fn init_pool(db_settings: &cfg::DatabaseSettings) -> Result<DbPool, DbError> {
    let options = PgConnectOptions::from_str(&db_settings.url)?;

    let pool = PgPoolOptions::new()
        .max_connections(db_settings.max_connections)
        .connect_with(options)
        .await
        .map_err(DbError::ConnectionError)?;

    if db_settings.run_migrations_on_startup {
        migrate_shared_catalog(&pool).await?;
        tracing::info!("Shared catalog migrations completed successfully");
    } else {
        tracing::info!("Shared catalog migrations skipped (run_migrations_on_startup = false)");
    }

    tracing::info!("Database initialized successfully");
    Ok(pool)
}

/// Applies the embedded shared-catalog migrations (tenants, users, memberships).
/// Tenant namespaces are migrated separately, see `db::migrate_namespace`.
pub async fn migrate_shared_catalog(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}
