//! Saving uploads to the upload directory and removing them again.
//!
//! [`FileManager::save`] validates an upload, writes it under a freshly generated name and hands
//! back a [`StoredFile`]. The stored file is a scoped resource: pass it to
//! [`FileManager::release`] when done, and if it is dropped instead (a panic, a cancelled
//! request) the file is still deleted in the background.

use std::{
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use metrics::counter;
use tracing::{debug, info, instrument, warn};

use super::{
    errors::{FileError, Result},
    pool::BlockingPool,
    storage::{ensure_directory, unique_name},
    validator::{size_limit_message, validate_extension, validate_size},
};
use crate::config::{ToolLimitsConfig, UploadConfig};

/// A file received from a client, alive for a single request.
pub struct UploadedFile<R> {
    /// Name the client gave the file. Only its extension is kept.
    pub filename: String,
    /// Rewindable byte stream
    pub content: R,
}

impl<R> UploadedFile<R> {
    pub fn new(filename: impl Into<String>, content: R) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// Per-call constraints for [`FileManager::save`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Accepted suffixes. `None` or an empty list accepts any file.
    pub allowed_extensions: Option<Vec<String>>,
    /// Maximum size in bytes. `None` means unbounded.
    pub max_size: Option<u64>,
    /// Store under this name instead of a generated one
    pub custom_name: Option<String>,
}

impl SaveOptions {
    pub fn from_limits(limits: &ToolLimitsConfig) -> Self {
        Self {
            allowed_extensions: Some(limits.allowed_extensions.clone()),
            max_size: Some(limits.max_file_size),
            custom_name: None,
        }
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }
}

/// A saved upload on disk, exclusively owned by the request that created it.
#[derive(Debug)]
pub struct StoredFile {
    path: PathBuf,
    armed: bool,
    abandoned: Arc<AtomicBool>,
    pool: BlockingPool,
}

impl StoredFile {
    fn new(path: PathBuf, pool: BlockingPool) -> Self {
        Self {
            path,
            armed: true,
            abandoned: Arc::new(AtomicBool::new(false)),
            pool,
        }
    }

    /// Absolute path of the stored file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generated (or custom) name of the stored file
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Keep the file on disk and take over responsibility for removing it.
    #[cfg(test)]
    fn into_path(mut self) -> PathBuf {
        self.disarm()
    }

    fn disarm(&mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StoredFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // A write still in flight checks this flag and removes its own output.
        self.abandoned.store(true, Ordering::SeqCst);
        let path = self.disarm();
        debug!(path = %path.display(), "Stored file dropped without release, scheduling removal");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                handle.spawn(async move {
                    let result = pool
                        .run(move || {
                            discard(&path);
                            Ok(())
                        })
                        .await;
                    if let Err(e) = result {
                        warn!(error = %e, "Scheduled removal of abandoned upload did not run");
                    }
                });
            }
            Err(_) => discard(&path),
        }
    }
}

/// Validates, stores and removes uploaded files in a single flat directory.
#[derive(Debug, Clone)]
pub struct FileManager {
    upload_dir: PathBuf,
    pool: BlockingPool,
}

impl FileManager {
    /// Prepare the upload directory and the worker pool.
    ///
    /// Fails with [`FileError::StorageInit`] if the directory cannot be created or its
    /// permissions set. The upload subsystem is unusable in that case.
    #[instrument(skip(config), fields(upload_dir = %config.upload_dir.display(), workers = config.worker_threads), err)]
    pub async fn new(config: &UploadConfig) -> Result<Self> {
        let pool = BlockingPool::new(config.worker_threads);
        let requested = config.upload_dir.clone();

        let dir = requested.clone();
        let upload_dir = pool
            .run(move || {
                ensure_directory(&dir)?;
                std::fs::canonicalize(&dir)
            })
            .await
            .map_err(|source| FileError::StorageInit { path: requested, source })?;

        info!(upload_dir = %upload_dir.display(), workers = pool.workers(), "Upload storage ready");

        Ok(Self { upload_dir, pool })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Validate `upload` against `options` and write it into the upload directory.
    ///
    /// Extension and size are both checked before any file is created. A failed write removes
    /// whatever was partially written before returning.
    #[instrument(skip(self, upload, options), fields(filename = %upload.filename), err)]
    pub async fn save<R>(&self, upload: UploadedFile<R>, options: &SaveOptions) -> Result<StoredFile>
    where
        R: Read + Seek + Send + 'static,
    {
        if let Some(allowed) = options.allowed_extensions.as_deref().filter(|allowed| !allowed.is_empty())
            && !validate_extension(&upload.filename, allowed)
        {
            counter!("toolbelt_files_rejected_total", "reason" => "extension").increment(1);
            return Err(FileError::validation(format!(
                "File type not allowed. Allowed types: {}",
                allowed.join(", ")
            )));
        }

        let name = match &options.custom_name {
            Some(name) => name.clone(),
            None => unique_name(&upload.filename),
        };

        let mut stored = StoredFile::new(self.upload_dir.join(&name), self.pool.clone());
        let target = stored.path.clone();
        let abandoned = stored.abandoned.clone();
        let max_size = options.max_size;
        let content = upload.content;

        let outcome = self
            .pool
            .run(move || Ok(write_upload(content, max_size, &target, &abandoned)))
            .await
            .map_err(|source| FileError::Save { source })
            .and_then(|written| written);

        match outcome {
            Ok(size) => {
                counter!("toolbelt_files_saved_total").increment(1);
                debug!(stored_as = %name, size, "Upload saved");
                Ok(stored)
            }
            Err(e @ FileError::Validation { .. }) => {
                // Rejected before the file was created.
                stored.disarm();
                counter!("toolbelt_files_rejected_total", "reason" => "size").increment(1);
                Err(e)
            }
            // The guard drops here and removes anything a crashed job left behind.
            Err(e) => Err(e),
        }
    }

    /// Delete a previously saved file.
    ///
    /// An empty path is a no-op and a file that no longer exists counts as removed, so calling
    /// this twice on the same path succeeds both times.
    #[instrument(skip(self), fields(path = %path.display()), err)]
    pub async fn cleanup(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Ok(());
        }

        let target = path.to_path_buf();
        match self.pool.run(move || remove_if_present(&target)).await {
            Ok(removed) => {
                if removed {
                    counter!("toolbelt_files_cleaned_total").increment(1);
                    debug!("Removed stored file");
                }
                Ok(())
            }
            Err(source) => {
                counter!("toolbelt_cleanup_failures_total").increment(1);
                Err(FileError::Cleanup {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Remove a stored file once the request is done with it. Failures are logged, never returned.
    pub async fn release(&self, mut stored: StoredFile) {
        let path = stored.disarm();
        if let Err(e) = self.cleanup(&path).await {
            warn!(error = %e, "Failed to remove stored upload");
        }
    }
}

fn write_upload<R: Read + Seek>(mut content: R, max_size: Option<u64>, path: &Path, abandoned: &AtomicBool) -> Result<u64> {
    let size = measure(&mut content).map_err(|e| {
        warn!(error = %e, "Could not determine upload size");
        FileError::validation("Failed to validate file size")
    })?;

    if let Some(max) = max_size
        && !validate_size(size, max)
    {
        return Err(FileError::validation(size_limit_message(max)));
    }

    let written = copy_to_file(&mut content, path).map_err(|source| {
        if let Err(e) = remove_if_present(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove partially written upload");
        }
        FileError::Save { source }
    })?;

    if abandoned.load(Ordering::SeqCst) {
        discard(path);
    }

    Ok(written)
}

fn measure<R: Seek>(content: &mut R) -> io::Result<u64> {
    let size = content.seek(SeekFrom::End(0))?;
    content.seek(SeekFrom::Start(0))?;
    Ok(size)
}

fn copy_to_file<R: Read>(content: &mut R, path: &Path) -> io::Result<u64> {
    let mut file = std::fs::File::create(path)?;
    let written = io::copy(content, &mut file)?;
    file.flush()?;
    Ok(written)
}

/// Returns whether a file was actually removed.
fn remove_if_present(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn discard(path: &Path) {
    match remove_if_present(path) {
        Ok(true) => {
            counter!("toolbelt_files_cleaned_total").increment(1);
            debug!(path = %path.display(), "Removed abandoned upload");
        }
        Ok(false) => {}
        Err(e) => {
            counter!("toolbelt_cleanup_failures_total").increment(1);
            warn!(path = %path.display(), error = %e, "Failed to remove abandoned upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    async fn manager(dir: &Path) -> FileManager {
        FileManager::new(&UploadConfig {
            upload_dir: dir.to_path_buf(),
            worker_threads: 2,
        })
        .await
        .unwrap()
    }

    fn pdf_options() -> SaveOptions {
        SaveOptions {
            allowed_extensions: Some(vec![".pdf".to_string()]),
            max_size: Some(10_000_000),
            custom_name: None,
        }
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    /// A stream whose size cannot be determined
    struct Unseekable(Cursor<Vec<u8>>);

    impl Read for Unseekable {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "not seekable"))
        }
    }

    /// A stream that fails part way through reading
    struct Flaky {
        remaining: usize,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::other("connection reset"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(b'x');
            self.remaining -= n;
            Ok(n)
        }
    }

    impl Seek for Flaky {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::End(_) => Ok(4096),
                _ => Ok(0),
            }
        }
    }

    #[tokio::test]
    async fn test_new_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("uploads");
        let manager = manager(&dir).await;

        assert!(dir.is_dir());
        assert!(manager.upload_dir().is_absolute());
    }

    #[tokio::test]
    async fn test_new_fails_when_path_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("uploads");
        std::fs::write(&file, b"occupied").unwrap();

        let err = FileManager::new(&UploadConfig {
            upload_dir: file,
            worker_threads: 1,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FileError::StorageInit { .. }));
    }

    #[tokio::test]
    async fn test_save_valid_pdf() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;
        let content = vec![7u8; 2 * 1024 * 1024];

        let stored = manager
            .save(UploadedFile::new("report.pdf", Cursor::new(content.clone())), &pdf_options())
            .await
            .unwrap();

        assert!(stored.path().exists());
        assert!(stored.path().starts_with(manager.upload_dir()));
        assert_eq!(stored.path().extension().unwrap(), "pdf");
        assert_eq!(stored.file_name().unwrap().len(), 36);
        assert_eq!(std::fs::read(stored.path()).unwrap(), content);

        manager.release(stored).await;
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_save_rejects_wrong_extension_before_writing() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let err = manager
            .save(UploadedFile::new("virus.exe", Cursor::new(b"MZ".to_vec())), &pdf_options())
            .await
            .unwrap_err();

        assert!(matches!(err, FileError::Validation { .. }));
        assert_eq!(err.to_string(), "File type not allowed. Allowed types: .pdf");
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_save_rejects_oversized_before_writing() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;
        let content = vec![0u8; 11 * 1024 * 1024];

        let err = manager
            .save(UploadedFile::new("big.pdf", Cursor::new(content)), &pdf_options())
            .await
            .unwrap_err();

        assert!(matches!(err, FileError::Validation { .. }));
        assert_eq!(err.to_string(), "File size exceeds maximum allowed size of 9.5MB");
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_save_accepts_exact_limit() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;
        let options = SaveOptions {
            max_size: Some(1024),
            ..Default::default()
        };

        let stored = manager
            .save(UploadedFile::new("exact.bin", Cursor::new(vec![1u8; 1024])), &options)
            .await
            .unwrap();
        assert_eq!(std::fs::metadata(stored.path()).unwrap().len(), 1024);
        manager.release(stored).await;
    }

    #[tokio::test]
    async fn test_save_without_constraints_accepts_anything() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let stored = manager
            .save(UploadedFile::new("notes", Cursor::new(b"hello".to_vec())), &SaveOptions::default())
            .await
            .unwrap();
        assert_eq!(stored.file_name().unwrap().len(), 32);
        manager.release(stored).await;
    }

    #[tokio::test]
    async fn test_save_with_custom_name() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let stored = manager
            .save(
                UploadedFile::new("original.pdf", Cursor::new(b"%PDF-1.4".to_vec())),
                &pdf_options().with_custom_name("fixed.pdf"),
            )
            .await
            .unwrap();

        assert_eq!(stored.file_name(), Some("fixed.pdf"));
        assert_eq!(stored.path(), manager.upload_dir().join("fixed.pdf"));
        manager.release(stored).await;
    }

    #[tokio::test]
    async fn test_save_fails_closed_on_unmeasurable_stream() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let err = manager
            .save(UploadedFile::new("doc.pdf", Unseekable(Cursor::new(vec![1, 2, 3]))), &pdf_options())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to validate file size");
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let err = manager
            .save(UploadedFile::new("doc.pdf", Flaky { remaining: 1000 }), &pdf_options())
            .await
            .unwrap_err();

        assert!(matches!(err, FileError::Save { .. }));
        assert!(err.to_string().starts_with("Failed to save file: "));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_generated_names_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let mut stored = Vec::new();
        for _ in 0..50 {
            stored.push(
                manager
                    .save(UploadedFile::new("same.pdf", Cursor::new(b"x".to_vec())), &pdf_options())
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(entries(root.path()), 50);

        for file in stored {
            manager.release(file).await;
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let path = manager
            .save(UploadedFile::new("a.pdf", Cursor::new(b"data".to_vec())), &pdf_options())
            .await
            .unwrap()
            .into_path();
        assert!(path.exists());

        manager.cleanup(&path).await.unwrap();
        assert!(!path.exists());
        manager.cleanup(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_empty_path_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;
        manager.cleanup(Path::new("")).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_reports_os_errors() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;
        let subdir = root.path().join("not-a-file");
        std::fs::create_dir(&subdir).unwrap();

        let err = manager.cleanup(&subdir).await.unwrap_err();
        assert!(matches!(err, FileError::Cleanup { .. }));
    }

    #[tokio::test]
    async fn test_into_path_keeps_file() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let path = manager
            .save(UploadedFile::new("keep.pdf", Cursor::new(b"data".to_vec())), &pdf_options())
            .await
            .unwrap()
            .into_path();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_dropped_stored_file_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path()).await;

        let stored = manager
            .save(UploadedFile::new("dropped.pdf", Cursor::new(b"data".to_vec())), &pdf_options())
            .await
            .unwrap();
        let path = stored.path().to_path_buf();
        drop(stored);

        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_stored_file_waits_for_a_worker() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().to_path_buf();
        let manager = FileManager::new(&UploadConfig {
            upload_dir: dir.clone(),
            worker_threads: 1,
        })
        .await
        .unwrap();

        let stored = manager
            .save(UploadedFile::new("queued.pdf", Cursor::new(b"data".to_vec())), &pdf_options())
            .await
            .unwrap();
        let path = stored.path().to_path_buf();

        // Occupy the only worker until told to stop
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let pool = manager.pool.clone();
        let blocker = tokio::spawn(async move {
            pool.run(move || {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
                Ok(())
            })
            .await
        });
        started_rx.await.unwrap();

        drop(stored);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(path.exists(), "removal must wait for a free worker");

        release_tx.send(()).unwrap();
        blocker.await.unwrap().unwrap();

        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!path.exists());
        assert_eq!(entries(&dir), 0);
    }

    #[test]
    fn test_dropped_outside_runtime_is_removed_inline() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("orphan.pdf");
        std::fs::write(&path, b"data").unwrap();

        drop(StoredFile::new(path.clone(), BlockingPool::new(1)));
        assert!(!path.exists());
    }
}
