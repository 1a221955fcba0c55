//! Response normalisation: split one raw model reply into its parts.
//!
//! The system prompt asks the model for a YAML front-matter block, a
//! `**Tags:** a, b, c` line and the transcription. Models follow that loosely:
//! some wrap everything in a ` ```markdown ` fence, some repeat the
//! front-matter block, some skip it altogether. Normalisation never fails;
//! anything it cannot recognise simply stays in the body.
//!
//! ## Step Order
//!
//! 1. Strip the outer code fence (models sometimes disobey the prompt)
//! 2. Split off the leading front-matter block; without one the cleaned text
//!    is the body and no tag extraction happens
//! 3. Pull the first `**Tags:**` line out of the body
//! 4. Drop any further leading front-matter blocks the model echoed

use crate::pipeline::frontmatter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One model reply, split into front-matter, body and tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedFragment {
    /// The leading `---` block exactly as the model wrote it.
    pub frontmatter: Option<String>,
    /// Transcription with the front-matter and tag line removed.
    pub body: String,
    /// Tags from the `**Tags:**` line, trimmed, de-duplicated, in order.
    pub tags: Vec<String>,
}

/// Normalise one raw model response.
///
/// `extension` is the lower-cased extension of the image the response
/// belongs to; it only feeds diagnostics.
pub fn normalize_response(raw: &str, extension: &str) -> NormalizedFragment {
    debug!("Normalising {} response ({} bytes)", extension, raw.len());

    let clean = strip_code_fences(raw);

    let Some((block, rest)) = frontmatter::split_leading(&clean) else {
        return NormalizedFragment {
            frontmatter: None,
            body: clean,
            tags: Vec::new(),
        };
    };

    let (body, tags) = take_tag_line(rest.trim());
    let body = frontmatter::strip_leading_blocks(&body).to_string();

    NormalizedFragment {
        frontmatter: Some(block.to_string()),
        body,
        tags,
    }
}

// ── Code fences ──────────────────────────────────────────────────────────────

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A```(?:markdown|md)?[ \t]*(?:\r?\n|\z)").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\r?\n|\A)```[ \t]*\z").unwrap());

/// Strip an outer ` ```markdown ` / ` ``` ` wrapper, tolerating either half.
///
/// The closing fence is only removed while fences are unbalanced, so a reply
/// that legitimately ends with a fenced code block keeps its closing fence.
fn strip_code_fences(input: &str) -> String {
    let s = RE_LEADING_FENCE.replace(input.trim(), "").to_string();

    let fence_lines = s
        .lines()
        .filter(|line| line.trim_start().starts_with("```"))
        .count();
    if fence_lines % 2 == 1 {
        RE_TRAILING_FENCE.replace(&s, "").trim().to_string()
    } else {
        s.trim().to_string()
    }
}

// ── Tag line ─────────────────────────────────────────────────────────────────

static RE_TAG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*Tags:\*\*[ \t]*(.*)").unwrap());

/// Remove the first `**Tags:**` line from `body` and parse its values.
fn take_tag_line(body: &str) -> (String, Vec<String>) {
    let lines: Vec<&str> = body.split('\n').collect();

    let found = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| RE_TAG_LINE.captures(line).map(|caps| (i, caps[1].to_string())));

    let Some((line_idx, list)) = found else {
        return (body.to_string(), Vec::new());
    };

    let mut tags: Vec<String> = Vec::new();
    for tag in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|seen| seen == tag) {
            tags.push(tag.to_string());
        }
    }

    let remaining: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != line_idx)
        .map(|(_, line)| *line)
        .collect();

    (remaining.join("\n").trim().to_string(), tags)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_response_is_split() {
        let raw = "---\ntitle: Meeting\ndate: 2024-05-01\n---\n**Tags:** work, planning\n\n# Meeting\n\n- item";
        let frag = normalize_response(raw, "png");
        assert_eq!(
            frag.frontmatter.as_deref(),
            Some("---\ntitle: Meeting\ndate: 2024-05-01\n---")
        );
        assert_eq!(frag.tags, vec!["work", "planning"]);
        assert_eq!(frag.body, "# Meeting\n\n- item");
    }

    #[test]
    fn body_has_no_delimiters_or_tag_line() {
        let raw = "---\ntitle: x\n---\nFirst line\n**Tags:** a, b\nLast line";
        let frag = normalize_response(raw, "jpg");
        assert!(!frag.body.contains("---"));
        assert!(!frag.body.contains("**Tags:**"));
        assert_eq!(frag.body, "First line\nLast line");
    }

    #[test]
    fn no_frontmatter_round_trip() {
        let raw = "  ```markdown\nJust some notes\n\nand more\n```  ";
        let frag = normalize_response(raw, "png");
        assert_eq!(frag.frontmatter, None);
        assert!(frag.tags.is_empty());
        assert_eq!(frag.body, "Just some notes\n\nand more");
    }

    #[test]
    fn no_frontmatter_keeps_tag_line_in_body() {
        let raw = "**Tags:** a, b\nHello";
        let frag = normalize_response(raw, "png");
        assert!(frag.tags.is_empty());
        assert_eq!(frag.body, raw);
    }

    #[test]
    fn fenced_response_with_frontmatter() {
        let raw = "```markdown\n---\ntitle: x\n---\n**Tags:** a\nHello\n```";
        let frag = normalize_response(raw, "png");
        assert_eq!(frag.frontmatter.as_deref(), Some("---\ntitle: x\n---"));
        assert_eq!(frag.tags, vec!["a"]);
        assert_eq!(frag.body, "Hello");
    }

    #[test]
    fn only_closing_fence_is_stripped() {
        let frag = normalize_response("Hello\n```", "png");
        assert_eq!(frag.body, "Hello");
    }

    #[test]
    fn trailing_code_block_is_kept() {
        let raw = "Some code:\n```python\nprint(1)\n```";
        let frag = normalize_response(raw, "png");
        assert_eq!(frag.body, raw);
    }

    #[test]
    fn tag_label_is_case_insensitive() {
        let raw = "---\na: 1\n---\n**TAGS:** x,  y ,, z\nBody";
        let frag = normalize_response(raw, "png");
        assert_eq!(frag.tags, vec!["x", "y", "z"]);
        assert_eq!(frag.body, "Body");
    }

    #[test]
    fn tags_deduplicated_within_fragment() {
        let raw = "---\na: 1\n---\n**Tags:** x, y, x\nBody";
        assert_eq!(normalize_response(raw, "png").tags, vec!["x", "y"]);
    }

    #[test]
    fn only_first_tag_line_is_taken() {
        let raw = "---\na: 1\n---\n**Tags:** a\nBody\n**Tags:** b";
        let frag = normalize_response(raw, "png");
        assert_eq!(frag.tags, vec!["a"]);
        assert_eq!(frag.body, "Body\n**Tags:** b");
    }

    #[test]
    fn echoed_frontmatter_is_removed() {
        let raw = "---\ndate: 1\n---\n**Tags:** a\n---\ndate: 1\n---\n---\ndate: 1\n---\nBody";
        let frag = normalize_response(raw, "png");
        assert_eq!(frag.frontmatter.as_deref(), Some("---\ndate: 1\n---"));
        assert_eq!(frag.body, "Body");
    }

    #[test]
    fn unclosed_frontmatter_degrades_to_body() {
        let raw = "---\ntitle: x\nHello";
        let frag = normalize_response(raw, "png");
        assert_eq!(frag.frontmatter, None);
        assert_eq!(frag.body, raw);
    }

    #[test]
    fn empty_response() {
        let frag = normalize_response("", "png");
        assert_eq!(frag, NormalizedFragment::default());
    }

    #[test]
    fn frontmatter_only_gives_empty_body() {
        let frag = normalize_response("---\ntitle: x\n---\n**Tags:** a", "png");
        assert_eq!(frag.body, "");
        assert_eq!(frag.tags, vec!["a"]);
    }
}
