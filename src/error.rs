//! Error types for the scriber library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ScriberError`]: **Fatal**: the run cannot proceed at all (note not
//!   found, provider not configured, nothing could be transcribed). Returned as
//!   `Err(ScriberError)` from [`crate::scribe::scribe_note`].
//!
//! * [`ImageError`]: **Non-fatal**: a single image failed (unresolvable
//!   embed, unsupported file, model call failed) but the other images are
//!   fine. Stored inside [`crate::output::ImageResult`] so callers can inspect
//!   partial success rather than losing the whole note to one bad image.
//!
//! * [`BackendError`]: what a [`crate::backend::ModelBackend`] reports for a
//!   single request. The pipeline folds it into [`ImageError::BackendFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scriber library.
///
/// Image-level failures use [`ImageError`] and are stored in
/// [`crate::output::ImageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ScriberError {
    // ── Store errors ──────────────────────────────────────────────────────
    /// The note does not exist in the vault.
    #[error("Note not found: '{id}'\nCheck the path is relative to the vault root.")]
    NoteNotFound { id: String },

    /// The note id is absolute or escapes the vault root.
    #[error("Invalid note path '{id}': must be relative and stay inside the vault")]
    InvalidPath { id: String },

    /// The note exists but could not be read.
    #[error("Failed to read note '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the patched note back.
    #[error("Failed to write note '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No model backend could be constructed (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every image was skipped or failed; the note is left untouched.
    #[error("No Markdown extracted from {total} image(s).\nFirst error: {first_error}")]
    NothingExtracted { total: usize, first_error: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single embedded image.
///
/// Stored alongside [`crate::output::ImageResult`] when an image is skipped.
/// The run continues unless ALL images fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// Neither the literal path nor the attachments-folder fallback exists.
    #[error("Image {index}: '{path}' not found in vault or attachments folder")]
    NotFound { index: usize, path: String },

    /// The resolved file is not a PNG or JPEG.
    #[error("Image {index}: unsupported image type '{extension}'")]
    UnsupportedExtension { index: usize, extension: String },

    /// The file exists but reading it failed.
    #[error("Image {index}: failed to read '{path}': {detail}")]
    ReadFailed {
        index: usize,
        path: String,
        detail: String,
    },

    /// The model backend returned a failure for this image.
    #[error("Image {index}: model call failed: {detail}")]
    BackendFailed { index: usize, detail: String },

    /// The model call exceeded `api_timeout_secs`.
    #[error("Image {index}: model call timed out after {secs}s")]
    Timeout { index: usize, secs: u64 },

    /// The model answered with nothing but whitespace.
    #[error("Image {index}: model returned an empty reply")]
    EmptyReply { index: usize },
}

impl ImageError {
    /// Re-number the error with the image's position in the note.
    ///
    /// Image sources resolve a path token without knowing where it sits in the
    /// note, so they report index 0 and the pipeline fills in the real one.
    pub fn with_index(self, index: usize) -> Self {
        match self {
            ImageError::NotFound { path, .. } => ImageError::NotFound { index, path },
            ImageError::UnsupportedExtension { extension, .. } => {
                ImageError::UnsupportedExtension { index, extension }
            }
            ImageError::ReadFailed { path, detail, .. } => {
                ImageError::ReadFailed {
                    index,
                    path,
                    detail,
                }
            }
            ImageError::BackendFailed { detail, .. } => ImageError::BackendFailed { index, detail },
            ImageError::Timeout { secs, .. } => ImageError::Timeout { index, secs },
            ImageError::EmptyReply { .. } => ImageError::EmptyReply { index },
        }
    }
}

/// Failure reported by a model backend for one transcription request.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network or TLS failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// An `edgequake-llm` provider returned an error.
    #[error("provider error: {0}")]
    Provider(String),

    /// The response arrived but did not contain a message.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_extracted_display() {
        let e = ScriberError::NothingExtracted {
            total: 3,
            first_error: "Image 1: model call failed: HTTP 500: boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 image(s)"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn provider_not_configured_display() {
        let e = ScriberError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "Set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn image_error_with_index_renumbers() {
        let e = ImageError::NotFound {
            index: 0,
            path: "scan.png".into(),
        }
        .with_index(4);
        assert!(e.to_string().starts_with("Image 4:"), "got: {e}");
        assert!(e.to_string().contains("scan.png"));
    }

    #[test]
    fn timeout_display() {
        let e = ImageError::Timeout { index: 2, secs: 30 };
        assert!(e.to_string().contains("30s"));
        assert!(e.to_string().contains("Image 2"));
    }

    #[test]
    fn backend_http_display() {
        let e = BackendError::Http {
            status: 401,
            body: "invalid key".into(),
        };
        assert_eq!(e.to_string(), "HTTP 401: invalid key");
    }
}
