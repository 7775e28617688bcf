use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the upload pipeline
#[derive(Error, Debug)]
pub enum FileError {
    /// The upload was rejected before anything was written (extension, size, unmeasurable stream)
    #[error("{message}")]
    Validation { message: String },

    /// Writing the upload to disk failed
    #[error("Failed to save file: {source}")]
    Save {
        #[source]
        source: std::io::Error,
    },

    /// The upload directory could not be created or its permissions set
    #[error("Failed to initialise upload directory {}: {source}", path.display())]
    StorageInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored file could not be removed
    #[error("Failed to clean up {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    pub fn validation(message: impl Into<String>) -> Self {
        FileError::Validation { message: message.into() }
    }
}

/// Type alias for upload pipeline results
pub type Result<T> = std::result::Result<T, FileError>;
