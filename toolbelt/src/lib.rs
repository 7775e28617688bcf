//! # toolbelt: utility tools behind one HTTP API
//!
//! `toolbelt` serves a registry of small utility tools (converters, calculators, formatters and
//! so on) together with the upload endpoints that run them. The shipped tool converts a PDF
//! into LaTeX source.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses SQLite for the tool registry.
//!
//! ### Request Flow
//!
//! Registry requests (`/api/v1/tools`) follow a traditional CRUD flow: the handler opens a
//! connection or transaction from the pool and works through the [`db`] repositories.
//!
//! Upload requests (`/api/v1/pdf-tools/*`) go through the upload pipeline in [`files`]: the
//! multipart `file` field is validated against the tool's configured extensions and size limit,
//! written under a random name in the upload directory by a bounded pool of blocking workers,
//! handed to the conversion service from [`services`], and deleted again however the request
//! ends.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use toolbelt::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = toolbelt::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     toolbelt::telemetry::init_telemetry(config.log_format)?;
//!
//!     // Create and start the application
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.ok();
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Configuration is loaded from a YAML file with environment variable overrides. See the
//! [`config`] module for details on available settings.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod files;
pub mod openapi;
pub mod services;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Uri},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::{
    errors::{Error, panic_response},
    files::FileManager,
    services::ToolRegistry,
};

/// Room left for multipart framing on top of the largest accepted upload.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .file_manager(file_manager)
///     .tools(Arc::new(ToolRegistry::with_defaults()))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub file_manager: FileManager,
    pub tools: Arc<ToolRegistry>,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    let cors = if config.cors.allowed_origins.iter().any(|origin| origin == "*") {
        cors.allow_origin(Any)
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            origins.push(
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("invalid CORS origin '{origin}'"))?,
            );
        }
        cors.allow_origin(origins)
    };

    Ok(match config.cors.max_age {
        Some(max_age) => cors.max_age(std::time::Duration::from_secs(max_age)),
        None => cors,
    })
}

/// Body limit for upload routes: the largest configured upload plus multipart framing.
fn upload_body_limit(config: &Config) -> usize {
    let largest = config.tools.values().map(|limits| limits.max_file_size).max().unwrap_or(0);
    usize::try_from(largest).unwrap_or(usize::MAX).saturating_add(MULTIPART_OVERHEAD)
}

async fn route_not_found(uri: Uri) -> Error {
    Error::RouteNotFound {
        path: uri.path().to_string(),
    }
}

/// Build the main application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - Tool registry routes and upload routes under the configured API prefix
/// - Welcome message, health check and API documentation at the root
/// - Optional Prometheus metrics
/// - Panic recovery, CORS configuration and tracing middleware
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route(
            "/tools",
            get(api::handlers::tools::list_tools).post(api::handlers::tools::create_tool),
        )
        .route(
            "/tools/{id}",
            get(api::handlers::tools::get_tool)
                .patch(api::handlers::tools::update_tool)
                .delete(api::handlers::tools::delete_tool),
        )
        // Upload route with custom body limit (other routes use default)
        .route(
            "/pdf-tools/pdf-to-latex",
            post(api::handlers::conversions::pdf_to_latex).layer(DefaultBodyLimit::max(upload_body_limit(&state.config))),
        )
        .with_state(state.clone());

    let doc = openapi::api_doc(&state.config);
    let doc_json = doc.clone();

    let router = Router::new()
        .route("/", get(api::handlers::root::welcome))
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(move || async move { Json(doc_json) }))
        .nest(&state.config.api_prefix, api_routes)
        .merge(Scalar::with_url("/docs", doc))
        .fallback(route_not_found)
        .layer(CatchPanicLayer::custom(panic_response));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    // Add Prometheus metrics if enabled
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting toolbelt with configuration: {:#?}", config);

        let pool = db::init_pool(&config.database)
            .await
            .with_context(|| format!("failed to open database '{}'", config.database.url))?;
        db::run_migrations(&pool).await.context("failed to run database migrations")?;

        // The upload subsystem cannot work without its directory, so this is fatal
        let file_manager = FileManager::new(&config.uploads).await?;

        let tools = ToolRegistry::with_defaults();
        anyhow::ensure!(!tools.is_empty(), "no conversion services registered");
        tools.verify_limits(&config)?;
        info!(count = tools.len(), services = ?tools, "Conversion services registered");

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .file_manager(file_manager)
            .tools(Arc::new(tools))
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Toolbelt listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Close database connections
        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
