// src/docs/chunker.rs
//
// Front-matter stripping plus chunking, built on `pulldown-cmark` for
// Markdown parsing. Targets ~1000 tokens (4 chars/token) per chunk with
// ~100 tokens (400 chars) overlap.

use std::collections::BTreeMap;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

pub const CHUNK_CHARS: usize = 4000;
pub const OVERLAP_CHARS: usize = 400;

pub struct FrontMatter {
    pub fields: BTreeMap<String, String>,
    pub body: String,
}

/// Strips a leading `---\n ... \n---` YAML-style block, lower-casing keys.
/// Returns the full input as `body` with empty `fields` when no front-matter
/// is present.
pub fn strip_front_matter(content: &str) -> FrontMatter {
    let trimmed = content.strip_prefix('\n').unwrap_or(content);
    if !trimmed.starts_with("---") {
        return FrontMatter { fields: BTreeMap::new(), body: content.to_string() };
    }

    let mut lines = trimmed.lines();
    lines.next(); // consume the opening `---`

    let mut fields = BTreeMap::new();
    let mut consumed_lines = 1;
    let mut closed = false;
    for line in lines {
        consumed_lines += 1;
        if line.trim() == "---" {
            closed = true;
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    if !closed {
        return FrontMatter { fields: BTreeMap::new(), body: content.to_string() };
    }

    let body: String = trimmed.lines().skip(consumed_lines).collect::<Vec<_>>().join("\n");
    FrontMatter { fields, body }
}

/// One text chunk plus its assigned index. The synthetic metadata chunk (if
/// any) is not produced here — `pipeline::chunk_document` prepends it and
/// shifts these indices by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
}

/// Markdown-aware split: breaks preferentially at block boundaries
/// (headings, paragraph breaks) so a chunk boundary rarely falls mid-sentence,
/// then falls back to the recursive character splitter for any block that
/// alone exceeds the budget.
pub fn chunk_markdown(body: &str) -> Vec<Chunk> {
    let boundaries = block_boundaries(body);
    chunk_at_boundaries(body, &boundaries)
}

/// Plain recursive character splitter for non-Markdown content: windows of
/// `CHUNK_CHARS` with `OVERLAP_CHARS` overlap, preferring to break on a
/// paragraph or line boundary within the window when one exists.
pub fn chunk_plain(body: &str) -> Vec<Chunk> {
    let boundaries: Vec<usize> = body
        .match_indices("\n\n")
        .map(|(i, _)| i)
        .chain(std::iter::once(body.len()))
        .collect();
    chunk_at_boundaries(body, &boundaries)
}

fn block_boundaries(body: &str) -> Vec<usize> {
    let parser = Parser::new(body);
    let mut offsets = Vec::new();
    let mut byte_offset = 0;
    for (event, range) in parser.into_offset_iter() {
        if let Event::Start(Tag::Heading { .. }) | Event::End(TagEnd::Paragraph) = event {
            offsets.push(range.start.max(byte_offset));
        }
        byte_offset = range.end;
    }
    offsets.push(body.len());
    offsets
}

fn chunk_at_boundaries(body: &str, boundaries: &[usize]) -> Vec<Chunk> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < body.len() {
        let target_end = (start + CHUNK_CHARS).min(body.len());
        let end = boundaries
            .iter()
            .copied()
            .filter(|&b| b > start && b <= target_end)
            .max()
            .unwrap_or(target_end);
        let end = end.max(start + 1).min(body.len());

        let text = body[start..end].trim().to_string();
        if !text.is_empty() {
            chunks.push(Chunk { text });
        }

        if end >= body.len() {
            break;
        }
        start = end.saturating_sub(OVERLAP_CHARS);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_front_matter_and_lowercases_keys() {
        let content = "---\nTitle: Runbook\nOwner: sre\n---\n# Body\ntext here";
        let fm = strip_front_matter(content);
        assert_eq!(fm.fields.get("title").map(String::as_str), Some("Runbook"));
        assert_eq!(fm.fields.get("owner").map(String::as_str), Some("sre"));
        assert!(fm.body.contains("# Body"));
    }

    #[test]
    fn no_front_matter_returns_whole_body() {
        let content = "just text, no front matter";
        let fm = strip_front_matter(content);
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, content);
    }

    #[test]
    fn short_body_produces_single_chunk() {
        let chunks = chunk_plain("a short document");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_body_produces_no_chunks() {
        assert!(chunk_plain("   ").is_empty());
    }

    #[test]
    fn long_body_splits_with_overlap() {
        let body = "word ".repeat(2000);
        let chunks = chunk_plain(&body);
        assert!(chunks.len() > 1);
    }
}
