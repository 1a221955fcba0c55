//! Pipeline stages for transcribing the images embedded in a note.
//!
//! Each submodule implements exactly one transformation step. The text
//! stages (`links`, `frontmatter`, `normalize`, `merge`, `patch`) are pure
//! functions over strings; only `input` and `llm` touch I/O.
//!
//! ## Data Flow
//!
//! ```text
//! note ──▶ links ──▶ input ──▶ encode ──▶ llm ──▶ normalize ──▶ merge ──▶ patch
//!         (embeds)  (bytes)   (base64)   (VLM)   (fragment)   (fold)   (insert)
//! ```
//!
//! 1. [`links`]: find `![[name.png]]` embeds in document order
//! 2. [`input`]: resolve a path token to bytes (literal, then
//!    attachments folder)
//! 3. [`encode`]: sniff the image type and base64-wrap it
//! 4. [`llm`]: one model call per image with a timeout; the only stage
//!    with network I/O
//! 5. [`normalize`]: split a reply into front-matter, tags and body
//! 6. [`merge`]: fold all fragments into one block and one body
//! 7. [`patch`]: insert the result before the first embed
//!
//! [`frontmatter`] holds the line-level block helpers shared by 5 and 6.

pub mod encode;
pub mod frontmatter;
pub mod input;
pub mod links;
pub mod llm;
pub mod merge;
pub mod normalize;
pub mod patch;
