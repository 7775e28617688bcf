use crate::api::models::responses::ApiResponse;
use crate::db::errors::DbError;
use crate::files::FileError;
use crate::services::ProcessingError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::multipart::MultipartRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::any::Any;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data (query parameters, body, multipart form)
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with id-{id} not found.")]
    NotFound { resource: String, id: String },

    /// No route matches the request path
    #[error("No route for {path}")]
    RouteNotFound { path: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Upload pipeline error
    #[error(transparent)]
    File(#[from] FileError),

    /// Conversion service error
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } | Error::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::File(file_err) => match file_err {
                FileError::Validation { .. } => StatusCode::BAD_REQUEST,
                FileError::Save { .. } | FileError::StorageInit { .. } | FileError::Cleanup { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Error::Processing(processing_err) => match processing_err {
                ProcessingError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                ProcessingError::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the short message placed in the envelope's `message` field
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { .. } | Error::RouteNotFound { .. } => self.to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, column, .. } => {
                    // Provide user-friendly messages for common unique constraint violations
                    match (table.as_deref(), column.as_deref()) {
                        (Some("tools"), Some("endpoint")) => "A tool with this endpoint already exists".to_string(),
                        _ => "Resource already exists".to_string(),
                    }
                }
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::File(FileError::StorageInit { .. } | FileError::Cleanup { .. }) => "Internal server error".to_string(),
            Error::File(file_err) => file_err.to_string(),
            Error::Processing(processing_err) => processing_err.to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Detail placed in the envelope's `error` field, including the full cause chain
    pub fn detail(&self) -> String {
        format!("{self:#}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_))
            | Error::Internal { .. }
            | Error::Other(_)
            | Error::File(FileError::Save { .. } | FileError::StorageInit { .. } | FileError::Cleanup { .. })
            | Error::Processing(ProcessingError::Failed { .. }) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::File(_) | Error::Processing(_) => {
                tracing::info!("Rejected upload: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::RouteNotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = ApiResponse::failure(self.user_message(), self.detail());
        (status, Json(body)).into_response()
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

/// Turns a panic caught by the panic layer into a 500 envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");

    let body = ApiResponse::failure("Internal server error", detail);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
