//! PDF to LaTeX conversion.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use super::{ProcessingError, ToolService};
use crate::config::PDF_TOOLS;

/// Returned for every successfully validated PDF until a real converter is wired in.
pub const PLACEHOLDER_LATEX: &str =
    "% Placeholder LaTeX content\n\\documentclass{article}\n\\begin{document}\nConverted content\n\\end{document}";

/// Converts an uploaded PDF into LaTeX source.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfToLatexService;

#[async_trait]
impl ToolService for PdfToLatexService {
    fn limits_key(&self) -> &'static str {
        PDF_TOOLS
    }

    async fn validate_input(&self, path: &Path) -> Result<bool, ProcessingError> {
        let exists = tokio::fs::try_exists(path).await.unwrap_or(false);
        if !exists {
            return Err(ProcessingError::invalid_input("File not found"));
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(ProcessingError::invalid_input("Invalid file type"));
        }

        Ok(true)
    }

    #[instrument(skip(self), fields(path = %path.display()), err)]
    async fn process(&self, path: &Path) -> Result<Value, ProcessingError> {
        self.validate_input(path).await.map_err(|e| match e {
            ProcessingError::InvalidInput { message } => {
                ProcessingError::invalid_input(format!("PDF processing failed: {message}"))
            }
            ProcessingError::Failed { message } => ProcessingError::failed(format!("PDF processing failed: {message}")),
        })?;

        Ok(json!({ "latex_content": PLACEHOLDER_LATEX }))
    }
}
