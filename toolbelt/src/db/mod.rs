//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with SQLite.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Write operations go through a transaction; reads may use a plain pooled connection:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut repo = Tools::new(&mut tx);
//! let tool = repo.create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;

use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::config::DatabaseConfig;

/// Open the SQLite pool described by `config`, creating the database file if needed.
pub async fn init_pool(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::from_str(&config.url)?
        .foreign_keys(true)
        .create_if_missing(true);

    let pool_settings = &config.pool;
    let pool = SqlitePoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(pool_settings.acquire_timeout())
        .idle_timeout(pool_settings.idle_timeout())
        .max_lifetime(pool_settings.max_lifetime())
        .connect_with(connect_options)
        .await?;

    info!(
        max_connections = pool_settings.max_connections,
        "Database pool initialized"
    );

    Ok(pool)
}

/// Apply any pending embedded migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
