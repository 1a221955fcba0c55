//! Document patching: insert the merged fragment before the anchor embed.
//!
//! The embed itself stays in the note; the transcription lands right above
//! it. Only the first literal occurrence is touched, so a note that embeds
//! the same scan twice gets one insertion, above the first copy.

use tracing::debug;

/// Insert `merged` immediately before the first occurrence of `anchor`.
///
/// Produces `merged + "\n\n" + anchor` in place of the anchor; every other
/// byte of `document` is unchanged. Returns the document untouched when the
/// anchor does not occur.
pub fn patch_document(document: &str, anchor: &str, merged: &str) -> String {
    if anchor.is_empty() || !document.contains(anchor) {
        debug!("Anchor {:?} not found; document left unchanged", anchor);
        return document.to_string();
    }
    if document.matches(anchor).nth(1).is_some() {
        debug!("Anchor {:?} occurs more than once; patching the first", anchor);
    }

    document.replacen(anchor, &format!("{merged}\n\n{anchor}"), 1)
}
