//! Upload pipeline: validation, storage layout, the blocking worker pool and the file manager.

pub mod errors;
pub mod manager;
pub mod pool;
pub mod storage;
pub mod validator;

pub use errors::FileError;
pub use manager::{FileManager, SaveOptions, StoredFile, UploadedFile};
