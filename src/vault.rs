//! Filesystem vault: a directory of Markdown notes and their attachments.
//!
//! Notes are addressed by their path relative to the vault root
//! (`"Daily/2024-05-01.md"`). Ids that are absolute or climb out of the root
//! are rejected. Writes replace the whole note atomically so a crash
//! mid-write never leaves a half-patched note behind.

use crate::error::{ImageError, ScriberError};
use crate::pipeline::input::{candidate_paths, extension_of, is_vault_relative, ImageBlob, ImageSource};
use crate::pipeline::links::is_supported_extension;
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default folder pasted images land in.
pub const DEFAULT_ATTACHMENTS_FOLDER: &str = "Attachments";

/// Whole-document storage for notes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Full text of the note.
    async fn read(&self, id: &str) -> Result<String, ScriberError>;

    /// Replace the note's full text.
    async fn write(&self, id: &str, text: &str) -> Result<(), ScriberError>;

    /// Create a new note; fails if it already exists.
    async fn create(&self, id: &str, text: &str) -> Result<(), ScriberError>;
}

/// A vault rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    attachments_folder: Option<String>,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            attachments_folder: Some(DEFAULT_ATTACHMENTS_FOLDER.to_string()),
        }
    }

    /// Folder searched when an embed's path doesn't resolve from the root.
    /// An empty string disables the fallback.
    pub fn with_attachments_folder(mut self, folder: impl Into<String>) -> Self {
        let folder = folder.into();
        self.attachments_folder = (!folder.trim().is_empty()).then_some(folder);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn attachments_folder(&self) -> Option<&str> {
        self.attachments_folder.as_deref()
    }

    /// Absolute path of a note id, rejecting ids that leave the vault.
    pub fn note_path(&self, id: &str) -> Result<PathBuf, ScriberError> {
        if !is_vault_relative(id) {
            return Err(ScriberError::InvalidPath { id: id.to_string() });
        }
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl DocumentStore for Vault {
    async fn read(&self, id: &str) -> Result<String, ScriberError> {
        let path = self.note_path(id)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ScriberError::NoteNotFound { id: id.to_string() }
            } else {
                ScriberError::ReadFailed { path, source: e }
            }
        })
    }

    async fn write(&self, id: &str, text: &str) -> Result<(), ScriberError> {
        let path = self.note_path(id)?;
        let text = text.to_string();
        tokio::task::spawn_blocking(move || write_atomic(&path, &text))
            .await
            .map_err(|e| ScriberError::Internal(format!("write task panicked: {e}")))?
    }

    async fn create(&self, id: &str, text: &str) -> Result<(), ScriberError> {
        let path = self.note_path(id)?;
        let text = text.to_string();
        tokio::task::spawn_blocking(move || create_atomic(&path, &text))
            .await
            .map_err(|e| ScriberError::Internal(format!("create task panicked: {e}")))?
    }
}

/// Write via a temp file in the same directory, then rename over the target.
fn write_atomic(path: &Path, text: &str) -> Result<(), ScriberError> {
    let tmp = staged(path, text)?;
    tmp.persist(path).map_err(|e| write_failed(path, e.error))?;

    debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}

/// Like [`write_atomic`], but fails with `AlreadyExists` instead of replacing
/// an existing note.
fn create_atomic(path: &Path, text: &str) -> Result<(), ScriberError> {
    let tmp = staged(path, text)?;
    tmp.persist_noclobber(path)
        .map_err(|e| write_failed(path, e.error))?;

    debug!("Created {} ({} bytes)", path.display(), text.len());
    Ok(())
}

/// A temp file next to `path` holding `text`.
fn staged(path: &Path, text: &str) -> Result<tempfile::NamedTempFile, ScriberError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| write_failed(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_failed(path, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| write_failed(path, e))?;
    Ok(tmp)
}

fn write_failed(path: &Path, source: std::io::Error) -> ScriberError {
    ScriberError::WriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl ImageSource for Vault {
    async fn fetch(&self, path: &str) -> Result<ImageBlob, ImageError> {
        for candidate in candidate_paths(path, self.attachments_folder.as_deref()) {
            if !is_vault_relative(&candidate) {
                continue;
            }
            let full = self.root.join(&candidate);
            match tokio::fs::metadata(&full).await {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }

            let extension = extension_of(&candidate).unwrap_or_default();
            if !is_supported_extension(&extension) {
                return Err(ImageError::UnsupportedExtension {
                    index: 0,
                    extension,
                });
            }

            let bytes = tokio::fs::read(&full).await.map_err(|e| ImageError::ReadFailed {
                index: 0,
                path: candidate.clone(),
                detail: e.to_string(),
            })?;
            debug!("Resolved {} → {} ({} bytes)", path, candidate, bytes.len());

            return Ok(ImageBlob {
                location: candidate,
                bytes,
                extension,
            });
        }

        Err(ImageError::NotFound {
            index: 0,
            path: path.to_string(),
        })
    }
}
