//! Upload endpoints that run a conversion service on the uploaded file.
//!
//! Every conversion follows the same lifecycle: read the multipart `file` field, save it through
//! the [`FileManager`](crate::files::FileManager), run the registered
//! [`ToolService`](crate::services::ToolService) on the stored path, and remove the stored file
//! whatever the outcome.

use std::io::Cursor;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use tracing::{debug, info, instrument};

use crate::{
    AppState,
    api::models::responses::ApiResponse,
    errors::{Error, Result},
    files::{FileError, SaveOptions, UploadedFile, validator::size_limit_message},
    services::PDF_TO_LATEX,
};

/// Name of the multipart field carrying the upload
const FILE_FIELD: &str = "file";

#[utoipa::path(
    post,
    path = "/pdf-tools/pdf-to-latex",
    tag = "pdf-tools",
    summary = "Convert PDF to LaTeX",
    description = "Upload a single PDF in the `file` field and receive its LaTeX source. The upload is deleted once the conversion finishes.",
    request_body(content_type = "multipart/form-data", description = "Multipart form with a single `file` field"),
    responses(
        (status = 200, description = "Conversion successful", body = ApiResponse),
        (status = 400, description = "Missing file, disallowed type, file too large or unreadable PDF", body = ApiResponse),
        (status = 500, description = "Saving or converting the file failed", body = ApiResponse)
    )
)]
pub async fn pdf_to_latex(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse>> {
    run_conversion(&state, PDF_TO_LATEX, multipart?).await
}

/// Save the uploaded file, run the `tool_id` service on it and always remove the stored file.
#[instrument(skip(state, multipart), err)]
pub async fn run_conversion(state: &AppState, tool_id: &str, multipart: Multipart) -> Result<Json<ApiResponse>> {
    let service = state.tools.get(tool_id).ok_or_else(|| Error::Internal {
        operation: format!("resolve conversion service '{tool_id}'"),
    })?;
    let limits = state.config.tool_limits(service.limits_key()).ok_or_else(|| Error::Internal {
        operation: format!("find upload limits '{}'", service.limits_key()),
    })?;

    let upload = read_upload(multipart, limits.max_file_size).await?;
    let stored = state.file_manager.save(upload, &SaveOptions::from_limits(limits)).await?;

    info!(stored_as = ?stored.file_name(), "Running conversion");
    let result = service.process(stored.path()).await;
    state.file_manager.release(stored).await;

    Ok(Json(ApiResponse::success("Conversion successful", result?)))
}

/// Buffer the `file` field of a multipart body.
///
/// At most `max_size + 1` bytes are kept: enough for the size check to reject an oversized
/// upload without holding all of it in memory.
async fn read_upload(mut multipart: Multipart, max_size: u64) -> Result<UploadedFile<Cursor<Vec<u8>>>> {
    let cap = usize::try_from(max_size.saturating_add(1)).unwrap_or(usize::MAX);

    while let Some(mut field) = multipart.next_field().await.map_err(|e| multipart_error(e, max_size))? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mut buffer = Vec::new();

        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_size))? {
            let remaining = cap - buffer.len();
            if chunk.len() >= remaining {
                buffer.extend_from_slice(&chunk[..remaining]);
                debug!(filename = %filename, max_size, "Upload exceeds size limit, stopped reading");
                break;
            }
            buffer.extend_from_slice(&chunk);
        }

        return Ok(UploadedFile::new(filename, Cursor::new(buffer)));
    }

    Err(Error::BadRequest {
        message: format!("Missing '{FILE_FIELD}' field in multipart body"),
    })
}

fn multipart_error(e: axum::extract::multipart::MultipartError, max_size: u64) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Error::File(FileError::validation(size_limit_message(max_size)));
    }
    Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    }
}
