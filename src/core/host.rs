//! Host file abstraction
//!
//! The component only needs four attributes and an asynchronous read from a
//! selected file. [`HostFile`] captures that; [`MemoryFile`] and
//! [`LocalFile`] are the two hosts shipped with the crate.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::core::models::{FileInfo, ReaderError, ReaderResult};
use crate::utils::file_utils::media_type_for;

/// A file selected through the control, owned by the host environment
#[async_trait]
pub trait HostFile: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Declared MIME type, possibly empty
    fn media_type(&self) -> &str;

    /// Milliseconds since the Unix epoch
    fn last_modified(&self) -> i64;

    /// Read the full contents
    async fn read_bytes(&self) -> ReaderResult<Bytes>;

    /// Snapshot of the attributes above
    fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name().to_string(),
            size: self.size(),
            media_type: self.media_type().to_string(),
            modified_at: self.last_modified(),
        }
    }
}

/// File held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    name: String,
    media_type: String,
    last_modified: i64,
    contents: Bytes,
}

impl MemoryFile {
    /// Create a file stamped with the current time
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            last_modified: Utc::now().timestamp_millis(),
            contents: contents.into(),
        }
    }

    /// Create a file whose media type is inferred from its name
    pub fn from_name(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        let name = name.into();
        let media_type = media_type_for(&name);
        Self::new(name, media_type, contents)
    }

    pub fn with_last_modified(mut self, last_modified: i64) -> Self {
        self.last_modified = last_modified;
        self
    }
}

#[async_trait]
impl HostFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.contents.len() as u64
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    async fn read_bytes(&self) -> ReaderResult<Bytes> {
        Ok(self.contents.clone())
    }
}

/// File on the local file system
///
/// Attributes are captured when the file is opened; contents are read
/// lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    media_type: String,
    size: u64,
    last_modified: i64,
}

impl LocalFile {
    pub async fn open<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ReaderError::Read {
                name: path.display().to_string(),
                message: "not a regular file".to_string(),
            });
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let last_modified = metadata
            .modified()
            .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
            .unwrap_or(0);

        debug!("Opened local file {} ({} bytes)", path.display(), metadata.len());

        Ok(Self {
            media_type: media_type_for(&name).to_string(),
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            last_modified,
        })
    }

    /// Override the inferred media type
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HostFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    async fn read_bytes(&self) -> ReaderResult<Bytes> {
        tokio::fs::read(&self.path)
            .await
            .map(Bytes::from)
            .map_err(|e| ReaderError::Read {
                name: self.name.clone(),
                message: e.to_string(),
            })
    }
}

/// Selection-change notification from the control
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    files: Vec<Arc<dyn HostFile>>,
    fired_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn from_files(files: Vec<Arc<dyn HostFile>>) -> Self {
        Self {
            files,
            fired_at: Utc::now(),
        }
    }

    /// Event for a single selected file
    pub fn single(file: impl HostFile + 'static) -> Self {
        let file: Arc<dyn HostFile> = Arc::new(file);
        Self::from_files(vec![file])
    }

    /// Event for a cleared selection
    pub fn empty() -> Self {
        Self::from_files(Vec::new())
    }

    pub fn files(&self) -> &[Arc<dyn HostFile>] {
        &self.files
    }

    pub fn first(&self) -> Option<&Arc<dyn HostFile>> {
        self.files.first()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn fired_at(&self) -> DateTime<Utc> {
        self.fired_at
    }
}
