//! Scratch artifacts: transient files owned by exactly one execution.
//!
//! Every artifact is named after a fresh v4 UUID, never after user input, and
//! is removed when its guard drops. Removal ignores "not found".

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Process-wide scratch root shared by all executions
#[derive(Debug, Clone)]
pub struct ScratchRoot {
    path: PathBuf,
}

impl ScratchRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<system temp>/mitra-scratch`
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("mitra-scratch"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the root on first use. Safe to call concurrently.
    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.path).await
    }

    /// Write `source` to `<root>/<uuid>.<extension>`
    pub async fn write_file(&self, extension: &str, source: &str) -> io::Result<ScratchFile> {
        self.ensure().await?;
        let path = self
            .path
            .join(format!("{}.{}", Uuid::new_v4(), extension));
        // Guard first so a failed write still cleans up a partial file
        let file = ScratchFile { path };
        tokio::fs::write(&file.path, source).await?;
        Ok(file)
    }

    /// Create a private `<root>/<uuid>/` directory
    pub async fn create_dir(&self) -> io::Result<ScratchDir> {
        self.ensure().await?;
        let path = self.path.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir(&path).await?;
        Ok(ScratchDir { path })
    }
}

impl Default for ScratchRoot {
    fn default() -> Self {
        Self::in_temp_dir()
    }
}

/// A single scratch file, deleted on drop
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

/// A private scratch directory, removed recursively on drop
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `source` to `<dir>/<file_name>`. The file lives as long as the directory.
    pub async fn write(&self, file_name: &str, source: &str) -> io::Result<PathBuf> {
        let path = self.path.join(file_name);
        tokio::fs::write(&path, source).await?;
        Ok(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}
