//! Result types returned by a scribe run.
//!
//! Everything here is `Serialize` so the CLI can dump a whole run with
//! `--json` and library callers can persist per-image diagnostics.

use crate::error::ImageError;
use crate::pipeline::links::ImageReference;
use serde::{Deserialize, Serialize};

/// Outcome of transcribing one embedded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// 1-indexed position of the embed in the note.
    pub index: usize,
    /// The literal embed, e.g. `![[scan.png]]`.
    pub reference: String,
    /// Lower-cased extension of the resolved file (or of the link when the
    /// file never resolved).
    pub extension: String,
    /// Raw model reply; empty when the image failed.
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Set when the image was skipped; the run carries on without it.
    pub error: Option<ImageError>,
}

impl ImageResult {
    /// A skipped image.
    pub fn failed(index: usize, link: &ImageReference, error: ImageError) -> Self {
        Self {
            index,
            reference: link.literal.clone(),
            extension: link.extension.clone(),
            markdown: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScribeStats {
    /// Image embeds found in the note.
    pub total_images: usize,
    /// Images that produced a model reply.
    pub transcribed_images: usize,
    /// Images skipped (unresolvable, unsupported, model failure).
    pub failed_images: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Wall-clock time spent in the concurrent fetch-and-transcribe stage.
    pub llm_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScribeOutput {
    /// Id of the note that was processed (empty for in-memory runs).
    pub note: String,
    /// Embeds found, in document order.
    pub links: Vec<ImageReference>,
    /// Per-image results, in document order.
    pub images: Vec<ImageResult>,
    /// The merged fragment that was inserted; `None` when no images were found.
    pub merged: Option<String>,
    /// The full patched note; `None` when no images were found.
    pub document: Option<String>,
    /// Whether the patched note was written back to the store.
    pub written: bool,
    pub stats: ScribeStats,
}

impl ScribeOutput {
    /// Output for a note without any supported image embeds.
    pub fn no_images(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Default::default()
        }
    }

    /// Whether the run found nothing to transcribe.
    pub fn found_no_images(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_copies_link() {
        let link = ImageReference {
            literal: "![[a.PNG]]".into(),
            path: "a.PNG".into(),
            extension: "png".into(),
        };
        let r = ImageResult::failed(
            2,
            &link,
            ImageError::NotFound {
                index: 2,
                path: "a.PNG".into(),
            },
        );
        assert!(!r.is_success());
        assert_eq!(r.reference, "![[a.PNG]]");
        assert_eq!(r.extension, "png");
        assert!(r.markdown.is_empty());
    }

    #[test]
    fn no_images_output() {
        let out = ScribeOutput::no_images("Daily/2024-05-01.md");
        assert!(out.found_no_images());
        assert!(!out.written);
        assert!(out.document.is_none());
    }

    #[test]
    fn output_serialises() {
        let out = ScribeOutput::no_images("n.md");
        let json = serde_json::to_string(&out).expect("serialise");
        assert!(json.contains("\"note\":\"n.md\""));
    }
}
