//! Input resolution: turn an embed's path token into image bytes.
//!
//! Obsidian-style vaults store pasted images either next to the note path
//! written in the embed or in a dedicated attachments folder, while the embed
//! only carries the file name. Resolution therefore tries the literal path
//! first and the attachments folder second. The [`ImageSource`] trait keeps
//! the pipeline independent of where the bytes actually live.

use crate::error::ImageError;
use async_trait::async_trait;
use std::path::{Component, Path};

/// Image bytes resolved from a path token.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    /// Where the bytes were found, relative to the source root.
    pub location: String,
    pub bytes: Vec<u8>,
    /// Lower-cased extension of `location`.
    pub extension: String,
}

/// Anything that can resolve an embed path token to image bytes.
///
/// Errors carry index 0; the pipeline re-numbers them with
/// [`ImageError::with_index`].
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<ImageBlob, ImageError>;
}

/// Paths to try for `path`, in order: literal, then inside `fallback_folder`.
pub fn candidate_paths(path: &str, fallback_folder: Option<&str>) -> Vec<String> {
    let mut candidates = vec![path.to_string()];
    if let Some(folder) = fallback_folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) {
        candidates.push(format!("{folder}/{path}"));
    }
    candidates
}

/// Whether `path` is relative and never climbs above its root.
pub fn is_vault_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Lower-cased extension of `path`, if any.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
