//! Conversion services that operate on stored uploads.
//!
//! Each service implements [`ToolService`] and is registered under a tool identifier in the
//! [`ToolRegistry`], which is built once at startup and shared through the application state.

pub mod pdf;

use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::config::Config;
use crate::errors::Error;

pub use pdf::PdfToLatexService;

/// Identifier of the PDF to LaTeX conversion tool
pub const PDF_TO_LATEX: &str = "pdf-to-latex";

/// Errors raised while validating or processing a stored upload
#[derive(ThisError, Debug)]
pub enum ProcessingError {
    /// The input is not something this service can handle
    #[error("{message}")]
    InvalidInput { message: String },

    /// The service accepted the input but failed to convert it
    #[error("{message}")]
    Failed { message: String },
}

impl ProcessingError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ProcessingError::InvalidInput { message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ProcessingError::Failed { message: message.into() }
    }
}

/// A conversion tool that turns a stored upload into a JSON result.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Name of the `tools` configuration entry whose upload limits apply to this service
    fn limits_key(&self) -> &'static str;

    /// Check that the file at `path` is something this service can process
    async fn validate_input(&self, path: &Path) -> Result<bool, ProcessingError>;

    /// Validate and convert the file at `path`
    async fn process(&self, path: &Path) -> Result<Value, ProcessingError>;
}

/// Conversion services keyed by tool identifier.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    services: HashMap<String, Arc<dyn ToolService>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("services", &self.ids()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in service
    pub fn with_defaults() -> Self {
        Self::new().register(PDF_TO_LATEX, PdfToLatexService)
    }

    pub fn register(mut self, id: impl Into<String>, service: impl ToolService + 'static) -> Self {
        self.services.insert(id.into(), Arc::new(service));
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ToolService>> {
        self.services.get(id).cloned()
    }

    /// Registered tool identifiers, sorted
    fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.services.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Ensure every registered service has an upload limits entry in `config`.
    pub fn verify_limits(&self, config: &Config) -> Result<(), Error> {
        for id in self.ids() {
            let key = self.services[id].limits_key();
            if config.tool_limits(key).is_none() {
                return Err(Error::Internal {
                    operation: format!("find upload limits 'tools.{key}' required by service '{id}'"),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
