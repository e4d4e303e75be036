//! Single-document notes storage.
//!
//! Owns the one notes file. Reads initialize an absent file with the
//! default body; writes are full atomic replacements so a concurrent
//! reader (or the change watcher) never observes a partial document.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::NotesError;

/// Body written the first time the notes file is requested and absent.
pub const DEFAULT_BODY: &str = "# My Notes\n\nStart writing here...\n";

/// The single notes document at a fixed path.
pub struct NotesStore {
    path: PathBuf,
}

impl NotesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document content.
    ///
    /// An absent file is initialized with the default body first, so
    /// two back-to-back reads agree. Any other I/O failure surfaces as
    /// `StorageUnavailable`.
    pub async fn read(&self) -> Result<String, NotesError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.write(DEFAULT_BODY).await?;
                Ok(DEFAULT_BODY.to_string())
            }
            Err(e) => Err(NotesError::StorageUnavailable(e)),
        }
    }

    /// Replace the entire document.
    ///
    /// Content lands in a temp file in the same directory, is synced to
    /// disk, then renamed over the target. A failed write leaves the
    /// previous content intact; a successful one is durable before this
    /// returns, so the watcher sees the new bytes immediately after.
    pub async fn write(&self, content: &str) -> Result<(), NotesError> {
        let tmp = self.tmp_path();
        let result = self.write_via(&tmp, content).await;
        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        result.map_err(NotesError::StorageUnavailable)
    }

    async fn write_via(&self, tmp: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut file = fs::File::create(tmp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(tmp, &self.path).await
    }

    // Dot-prefixed so the watcher's file-name filter never sees the
    // temp file, only the rename onto the real name.
    fn tmp_path(&self) -> PathBuf {
        let name = format!(
            ".{}.{}.tmp",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            uuid::Uuid::new_v4().simple()
        );
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        }
    }
}
