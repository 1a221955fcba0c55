//! Line-oriented helpers for `---`-delimited front-matter blocks.
//!
//! This is deliberately not a YAML parser. Model output only has to follow a
//! loose convention, and the merge rules only ever need to find a block,
//! drop `tags:` declarations, and put a line in front of the closing
//! delimiter. Doing that on lines keeps every other key byte-identical to
//! what the model wrote (comments, quoting, key order).

/// Opening and closing line of a front-matter block.
pub const DELIMITER: &str = "---";

/// Whether `line` is a block delimiter (`---`, trailing whitespace allowed).
pub fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// Split a leading front-matter block off `text`.
///
/// The first line must be a delimiter; the block ends at the first later
/// delimiter line with non-empty content in between. Returns
/// `(block, rest)` where `block` runs from the opening `---` through the
/// closing `---` (without its line terminator) and `rest` is everything after.
pub fn split_leading(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if !first.ends_with('\n') || !is_delimiter(first) {
        return None;
    }

    let content_start = first.len();
    let mut offset = content_start;
    for line in lines {
        let line_start = offset;
        offset += line.len();
        // `line_start - 1` is the newline ending the previous line, so the
        // content is non-empty only when at least one byte precedes it.
        if is_delimiter(line) && line_start > content_start + 1 {
            let end = line_start + line.trim_end().len();
            return Some((&text[..end], &text[end..]));
        }
    }
    None
}

/// Remove every leading front-matter block, trimming between blocks.
pub fn strip_leading_blocks(text: &str) -> &str {
    let mut rest = text.trim();
    while let Some((_, after)) = split_leading(rest) {
        rest = after.trim();
    }
    rest
}

/// Whether `line` declares a `tags` key (any case, any indentation).
pub fn is_tags_declaration(line: &str) -> bool {
    line.trim_start()
        .get(..5)
        .is_some_and(|key| key.eq_ignore_ascii_case("tags:"))
}

/// Drop every `tags:` declaration from a block.
///
/// Handles both the inline array form (`tags: [a, b]`) and the block-list
/// form, where the list items that follow an empty `tags:` are dropped too.
pub fn strip_tags(block: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_tag_list = false;

    for line in block.lines() {
        if in_tag_list {
            let item = line.trim_start();
            if item.starts_with("- ") || item == "-" {
                continue;
            }
            in_tag_list = false;
        }
        if is_tags_declaration(line) {
            in_tag_list = line.trim_start()[5..].trim().is_empty();
            continue;
        }
        kept.push(line);
    }

    kept.join("\n")
}

/// Render `tags: ["a", "b"]`, or `None` for an empty tag list.
///
/// Values are quoted verbatim; embedded quotes are passed through.
pub fn tags_line(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    let quoted: Vec<String> = tags.iter().map(|t| format!("\"{}\"", t)).collect();
    Some(format!("tags: [{}]", quoted.join(", ")))
}

/// Insert `line` before the closing delimiter of `block`.
///
/// A closing delimiter is appended first when the block's last line is not
/// one.
pub fn insert_before_closing(block: &str, line: Option<&str>) -> String {
    let mut lines: Vec<&str> = block.lines().collect();
    if !lines.last().is_some_and(|l| is_delimiter(l)) {
        lines.push(DELIMITER);
    }

    if let Some(line) = line {
        if let Some(close) = lines.iter().rposition(|l| is_delimiter(l)) {
            lines.insert(close, line);
        }
    }

    lines.join("\n")
}

/// Minimal block holding a single line.
pub fn synthesize(line: &str) -> String {
    format!("{DELIMITER}\n{line}\n{DELIMITER}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_simple_block() {
        let (block, rest) = split_leading("---\ntitle: x\n---\nHello").unwrap();
        assert_eq!(block, "---\ntitle: x\n---");
        assert_eq!(rest, "\nHello");
    }

    #[test]
    fn split_takes_shortest_span() {
        let text = "---\na: 1\n---\nbody\n---\nb: 2\n---";
        let (block, _) = split_leading(text).unwrap();
        assert_eq!(block, "---\na: 1\n---");
    }

    #[test]
    fn split_requires_opening_on_first_line() {
        assert!(split_leading("Hello\n---\na: 1\n---").is_none());
        assert!(split_leading(" ---\na: 1\n---").is_none());
    }

    #[test]
    fn split_requires_closing_delimiter() {
        assert!(split_leading("---\ntitle: x\nHello").is_none());
    }

    #[test]
    fn split_rejects_empty_block() {
        assert!(split_leading("---\n---\nHello").is_none());
        assert!(split_leading("---\n\n---\nHello").is_none());
    }

    #[test]
    fn split_block_at_end_of_text() {
        let (block, rest) = split_leading("---\ndate: 1\n---").unwrap();
        assert_eq!(block, "---\ndate: 1\n---");
        assert_eq!(rest, "");
    }

    #[test]
    fn split_tolerates_crlf() {
        let (block, rest) = split_leading("---\r\na: 1\r\n---\r\nbody").unwrap();
        assert_eq!(block, "---\r\na: 1\r\n---");
        assert_eq!(rest, "\r\nbody");
    }

    #[test]
    fn strip_leading_blocks_removes_repeats() {
        let text = "---\na: 1\n---\n\n---\na: 1\n---\nBody text";
        assert_eq!(strip_leading_blocks(text), "Body text");
    }

    #[test]
    fn strip_leading_blocks_keeps_plain_text() {
        assert_eq!(strip_leading_blocks("  Body\n---\nx\n---  "), "Body\n---\nx\n---");
    }

    #[test]
    fn tags_declaration_detection() {
        assert!(is_tags_declaration("tags: [a]"));
        assert!(is_tags_declaration("  Tags: a"));
        assert!(!is_tags_declaration("title: tags"));
        assert!(!is_tags_declaration("tag: a"));
    }

    #[test]
    fn strip_inline_tags() {
        let block = "---\ntitle: x\ntags: [\"a\", \"b\"]\ndate: 1\n---";
        assert_eq!(strip_tags(block), "---\ntitle: x\ndate: 1\n---");
    }

    #[test]
    fn strip_block_list_tags() {
        let block = "---\ntags:\n  - a\n  - b\ndate: 1\n---";
        assert_eq!(strip_tags(block), "---\ndate: 1\n---");
    }

    #[test]
    fn tags_line_quotes_values() {
        let tags = vec!["a".to_string(), "two words".to_string()];
        assert_eq!(tags_line(&tags).unwrap(), "tags: [\"a\", \"two words\"]");
        assert!(tags_line(&[]).is_none());
    }

    #[test]
    fn insert_before_existing_closing() {
        let out = insert_before_closing("---\ntitle: x\n---", Some("tags: [\"a\"]"));
        assert_eq!(out, "---\ntitle: x\ntags: [\"a\"]\n---");
    }

    #[test]
    fn insert_appends_missing_closing() {
        let out = insert_before_closing("---\ntitle: x", Some("tags: [\"a\"]"));
        assert_eq!(out, "---\ntitle: x\ntags: [\"a\"]\n---");
    }

    #[test]
    fn insert_without_line_only_closes() {
        assert_eq!(insert_before_closing("---\ntitle: x", None), "---\ntitle: x\n---");
    }

    #[test]
    fn synthesize_block() {
        assert_eq!(synthesize("tags: [\"a\"]"), "---\ntags: [\"a\"]\n---");
    }
}
