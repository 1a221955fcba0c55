//! Fragment merging: fold N normalised replies into one Markdown fragment.
//!
//! ## Rules
//!
//! - Tags from every fragment are unioned in first-seen order (exact,
//!   case-sensitive match).
//! - The first fragment that has front-matter provides the template; later
//!   blocks are discarded and only their tags survive.
//! - The template's own `tags:` declarations are replaced by a single
//!   `tags: [...]` line placed just before the closing `---`.
//! - Without any template, tags get a minimal synthesized block.
//! - Bodies are joined with one blank line, in input order. Empty bodies keep
//!   their slot.

use crate::pipeline::frontmatter;
use crate::pipeline::normalize::NormalizedFragment;
use serde::{Deserialize, Serialize};

/// The merged front-matter block and body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedResult {
    /// A single `---` block, or empty when no fragment had front-matter or tags.
    pub frontmatter: String,
    /// All fragment bodies separated by one blank line.
    pub body: String,
}

impl MergedResult {
    /// Render as the text inserted into the note: the front-matter block, a
    /// blank line, then the body. The separator is kept even when the block
    /// is empty.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.frontmatter, self.body)
    }
}

/// Merge fragments in the given order.
pub fn merge_fragments(fragments: &[NormalizedFragment]) -> MergedResult {
    let tags = union_tags(fragments);
    let tag_line = frontmatter::tags_line(&tags);

    let template = fragments.iter().find_map(|f| f.frontmatter.as_deref());

    let frontmatter = match (template, tag_line.as_deref()) {
        (Some(block), line) => {
            frontmatter::insert_before_closing(&frontmatter::strip_tags(block), line)
        }
        (None, Some(line)) => frontmatter::synthesize(line),
        (None, None) => String::new(),
    };

    let body = fragments
        .iter()
        .map(|f| f.body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    MergedResult { frontmatter, body }
}

/// Every fragment's tags in order, first occurrence wins.
pub fn union_tags(fragments: &[NormalizedFragment]) -> Vec<String> {
    let mut all: Vec<String> = Vec::new();
    for tag in fragments.iter().flat_map(|f| f.tags.iter()) {
        let tag = tag.trim();
        if !tag.is_empty() && !all.iter().any(|seen| seen == tag) {
            all.push(tag.to_string());
        }
    }
    all
}
