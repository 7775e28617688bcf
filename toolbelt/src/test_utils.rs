//! Test utilities for integration testing.

use std::path::Path;

use axum_test::TestServer;
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::{Config, DatabaseConfig, PoolSettings};
use crate::{Application, db};

/// In-memory databases live as long as their single connection, so it must never be recycled
fn memory_database() -> DatabaseConfig {
    DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        pool: PoolSettings {
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 0,
            max_lifetime_secs: 0,
        },
    }
}

pub fn create_test_config(upload_dir: &Path) -> Config {
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.database = memory_database();
    config.uploads.upload_dir = upload_dir.to_path_buf();
    config.uploads.worker_threads = 2;
    // The Prometheus recorder is process-global and can only be installed once
    config.enable_metrics = false;
    config
}

/// A migrated in-memory database
pub async fn create_test_pool() -> SqlitePool {
    let pool = db::init_pool(&memory_database()).await.expect("Failed to open test database");
    db::run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

/// A test server with default configuration. The returned directory is the upload directory.
pub async fn create_test_app() -> (TestServer, TempDir) {
    create_test_app_with(|_| {}).await
}

/// A test server whose configuration is adjusted by `configure` before startup.
pub async fn create_test_app_with(configure: impl FnOnce(&mut Config)) -> (TestServer, TempDir) {
    let upload_dir = tempfile::tempdir().expect("Failed to create upload directory");
    let mut config = create_test_config(upload_dir.path());
    configure(&mut config);

    let app = Application::new(config).await.expect("Failed to create application");
    (app.into_test_server(), upload_dir)
}
