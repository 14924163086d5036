//! Storage directory operations.
//!
//! Uploads are streamed into a temporary file inside the storage directory and
//! then renamed into place under the client-supplied name. Names are used
//! verbatim: there is no sanitization and no collision handling, so an upload
//! silently replaces an existing file of the same name.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::config::{DownloadRoot, StorageConfig};

/// Errors that can occur while touching the storage directory.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The submitted file name cannot name an entry in the storage directory.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// The requested path is a directory, not a file.
    #[error("path is a directory: {0}")]
    IsADirectory(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An upload being buffered to a temporary file.
///
/// Dropping it without calling [`FileStore::persist`] leaves the temporary file
/// behind in the storage directory.
#[derive(Debug)]
pub struct PendingUpload {
    /// File name as submitted by the client.
    pub file_name: String,
    /// Temporary file path.
    pub temp_path: PathBuf,
    /// Bytes written so far.
    pub bytes_written: u64,
    file: File,
}

impl PendingUpload {
    /// Append a chunk of the uploaded body.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), StoreError> {
        self.file.write_all(data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

/// Handle to the storage directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    download_root: DownloadRoot,
}

impl FileStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, download_root: DownloadRoot) -> Self {
        Self {
            root: root.into(),
            download_root,
        }
    }

    /// Create a store from the storage section of the configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.dir.clone(), config.download_root)
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Start buffering an upload into a fresh temporary file.
    pub async fn begin_upload(&self, file_name: &str) -> Result<PendingUpload, StoreError> {
        let temp_filename = format!(
            "upload_{:x}_{}.tmp",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            rand::random::<u32>()
        );
        let temp_path = self.root.join(temp_filename);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(PendingUpload {
            file_name: file_name.to_string(),
            temp_path,
            bytes_written: 0,
            file,
        })
    }

    /// Final location of an upload named `file_name`.
    ///
    /// Leading `/` characters are dropped so the name stays relative to the
    /// storage directory; everything else, `..` included, is kept.
    pub fn destination(&self, file_name: &str) -> Result<PathBuf, StoreError> {
        let relative = file_name.trim_start_matches('/');
        if relative.is_empty() {
            return Err(StoreError::InvalidFileName(file_name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Move a finished upload to its final location, replacing any existing file.
    ///
    /// Returns the destination path.
    pub async fn persist(&self, upload: PendingUpload) -> Result<PathBuf, StoreError> {
        let PendingUpload {
            file_name,
            temp_path,
            mut file,
            ..
        } = upload;

        file.flush().await?;
        drop(file);

        let destination = self.destination(&file_name)?;
        fs::rename(&temp_path, &destination).await?;

        Ok(destination)
    }

    /// Names of every entry in the storage directory, sorted.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        names.sort();
        Ok(names)
    }

    /// Path a download request for `name` reads from.
    pub fn download_path(&self, name: &str) -> PathBuf {
        match self.download_root {
            DownloadRoot::Storage => self.root.join(name),
            DownloadRoot::WorkingDir => PathBuf::from(name),
        }
    }

    /// Resolve a download name, returning `None` when nothing exists there.
    pub async fn locate(&self, name: &str) -> Result<Option<PathBuf>, StoreError> {
        let path = self.download_path(name);
        if fs::try_exists(&path).await? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    /// Open a located file for streaming.
    pub async fn open(&self, path: &Path) -> Result<File, StoreError> {
        let metadata = fs::metadata(path).await?;
        if metadata.is_dir() {
            return Err(StoreError::IsADirectory(path.to_path_buf()));
        }
        Ok(File::open(path).await?)
    }
}
