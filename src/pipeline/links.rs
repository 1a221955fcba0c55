//! Link extraction: find `![[scan.png]]`-style image embeds in a note.
//!
//! Only the wiki-embed form with a png/jpg/jpeg extension is recognised. The
//! extension match is case-insensitive (`![[IMG_0042.JPG]]` is common on
//! phones). Matches come back in document order and duplicates are kept, so
//! the same scan embedded twice is transcribed twice.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Extensions accepted by [`extract_image_links`] and the image source.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

static RE_IMAGE_EMBED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)!\[\[([^\]]+\.(png|jpg|jpeg))\]\]").unwrap());

/// One image embed as it appears in the note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// The literal embed, e.g. `![[Scans/page 1.png]]`.
    pub literal: String,
    /// The path token between the brackets, e.g. `Scans/page 1.png`.
    pub path: String,
    /// Lower-cased extension of the path token.
    pub extension: String,
}

/// Return every supported image embed in `content`, in order of appearance.
///
/// An empty result means there is nothing to transcribe; it is not an error.
pub fn extract_image_links(content: &str) -> Vec<ImageReference> {
    RE_IMAGE_EMBED
        .captures_iter(content)
        .map(|caps| ImageReference {
            literal: caps[0].to_string(),
            path: caps[1].to_string(),
            extension: caps[2].to_ascii_lowercase(),
        })
        .collect()
}

/// Whether `ext` (any case) is one of [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}
