//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `TOOLBELT_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **Built-in defaults** - [`Config::default`]
//! 2. **YAML config file** - Base configuration (default: `config.yaml`)
//! 3. **Environment variables** - Variables prefixed with `TOOLBELT_` override YAML values
//! 4. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `TOOLBELT_UPLOADS__WORKER_THREADS=8` sets the `uploads.worker_threads` field, and
//! `TOOLBELT_TOOLS__PDF_TOOLS__MAX_FILE_SIZE=20000000` raises the PDF upload limit.
//!
//! The configuration is read once at startup and passed explicitly into the constructors that
//! need it; there is no global settings object and no hot reload.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use toolbelt::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use crate::{errors::Error, services::ToolRegistry};

/// Limits entry used by the PDF conversion tools.
pub const PDF_TOOLS: &str = "pdf_tools";

/// Limits entry used by the image tools.
pub const IMAGE_TOOLS: &str = "image_tools";

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TOOLBELT_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from defaults, YAML and environment
/// variables. All fields have defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Name shown in the API documentation
    pub project_name: String,
    /// Version shown in the API documentation
    pub version: String,
    /// Prefix under which the versioned API is mounted
    pub api_prefix: String,
    /// Database connection settings
    pub database: DatabaseConfig,
    /// Upload directory and worker pool settings
    pub uploads: UploadConfig,
    /// Per-tool upload limits, keyed by the name a conversion service asks for
    pub tools: BTreeMap<String, ToolLimitsConfig>,
    /// CORS settings
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Console log output format
    pub log_format: LogFormat,
}

/// Connection pool settings with the SQLx parameters we expose.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
    /// Maximum lifetime of a connection (seconds, 0 = never)
    pub max_lifetime_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,  // 10 minutes
            max_lifetime_secs: 1800, // 30 minutes
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// `None` when idle connections are never closed
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// `None` when connections live forever
    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.max_lifetime_secs > 0).then(|| Duration::from_secs(self.max_lifetime_secs))
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection string; the file is created if missing
    pub url: String,
    /// Connection pool settings
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://toolbelt.db".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Flat directory that saved uploads are written to
    pub upload_dir: PathBuf,
    /// Number of blocking filesystem jobs allowed to run at once
    pub worker_threads: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            worker_threads: 4,
        }
    }
}

/// Upload limits for one family of tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolLimitsConfig {
    /// Accepted filename suffixes, including the leading dot. Empty accepts any file.
    pub allowed_extensions: Vec<String>,
    /// Maximum accepted upload size in bytes
    pub max_file_size: u64,
}

impl Default for ToolLimitsConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: Vec::new(),
            max_file_size: 10_000_000, // 10MB
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; a single "*" allows any origin
    pub allowed_origins: Vec<String>,
    /// How long browsers may cache preflight responses, in seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// Console log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        let mut tools = BTreeMap::new();
        tools.insert(
            PDF_TOOLS.to_string(),
            ToolLimitsConfig {
                allowed_extensions: vec![".pdf".to_string()],
                max_file_size: 10_000_000, // 10MB
            },
        );
        tools.insert(
            IMAGE_TOOLS.to_string(),
            ToolLimitsConfig {
                allowed_extensions: vec![".jpg".to_string(), ".png".to_string(), ".jpeg".to_string()],
                max_file_size: 5_000_000, // 5MB
            },
        );

        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            project_name: "Toolbelt API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_prefix: "/api/v1".to_string(),
            database: DatabaseConfig::default(),
            uploads: UploadConfig::default(),
            tools,
            cors: CorsConfig::default(),
            enable_metrics: true,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("TOOLBELT_").ignore(&["CONFIG"]).split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if !self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/') {
            return Err(config_error(format!(
                "api_prefix must start with '/' and must not end with one, got '{}'",
                self.api_prefix
            )));
        }

        if self.uploads.worker_threads == 0 {
            return Err(config_error("uploads.worker_threads must be greater than 0".to_string()));
        }

        let pool = &self.database.pool;
        if pool.max_connections == 0 {
            return Err(config_error("database.pool.max_connections must be greater than 0".to_string()));
        }
        if pool.min_connections > pool.max_connections {
            return Err(config_error(format!(
                "database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                pool.min_connections, pool.max_connections
            )));
        }

        for (name, limits) in &self.tools {
            if limits.max_file_size == 0 {
                return Err(config_error(format!("tools.{name}.max_file_size must be greater than 0")));
            }
            if let Some(ext) = limits.allowed_extensions.iter().find(|ext| !ext.starts_with('.') || ext.len() < 2) {
                return Err(config_error(format!(
                    "tools.{name}.allowed_extensions entries must look like '.pdf', got '{ext}'"
                )));
            }
        }

        // Every built-in conversion service needs its limits entry
        ToolRegistry::with_defaults().verify_limits(self)?;

        Ok(())
    }

    /// Upload limits for a tools entry, if configured
    pub fn tool_limits(&self, name: &str) -> Option<&ToolLimitsConfig> {
        self.tools.get(name)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn config_error(message: String) -> Error {
    Error::Internal {
        operation: format!("Config validation: {message}"),
    }
}
