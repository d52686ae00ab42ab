//! Header-aware document chunking.
//!
//! A document is split on second-level (`## `) headers. Every chunk is
//! prefixed with a back-reference to its source and the document title so it
//! reads on its own once retrieved.

use crate::types::{ChunkDraft, Meta};

pub const INTRODUCTION: &str = "Introduction";

/// Split `content` into chunks keyed by its `##` sections.
///
/// The first `# ` line is the document title (falls back to `source_id`) and
/// is not repeated inside any section. Text before the first `##` header is
/// kept as an "Introduction" chunk when it is not blank.
pub fn chunk(content: &str, source_id: &str) -> Vec<ChunkDraft> {
    if content.trim().is_empty() {
        return vec![fallback(content, source_id)];
    }

    let mut title: Option<&str> = None;
    let mut sections: Vec<Vec<&str>> = vec![Vec::new()];
    for line in content.lines() {
        if title.is_none() {
            if let Some(t) = header_text(line, 1) {
                title = Some(t);
                continue;
            }
        }
        if header_text(line, 2).is_some() {
            sections.push(vec![line]);
        } else if let Some(current) = sections.last_mut() {
            current.push(line);
        }
    }
    let doc_title = title.unwrap_or(source_id);

    let chunks: Vec<ChunkDraft> = sections
        .iter()
        .filter_map(|lines| {
            let section = lines.join("\n");
            let section = section.trim();
            if section.is_empty() {
                return None;
            }
            let section_title = lines
                .first()
                .and_then(|first| header_text(first, 2))
                .unwrap_or(INTRODUCTION);
            Some(ChunkDraft {
                content: format!("[From: {source_id}]\n# {doc_title}\n\n{section}"),
                metadata: metadata(source_id, section_title),
            })
        })
        .collect();

    if chunks.is_empty() {
        return vec![fallback(content, source_id)];
    }
    chunks
}

fn fallback(content: &str, source_id: &str) -> ChunkDraft {
    ChunkDraft { content: content.to_string(), metadata: metadata(source_id, INTRODUCTION) }
}

fn metadata(source_id: &str, section_title: &str) -> Meta {
    let mut meta = Meta::new();
    meta.insert("source_id".to_string(), source_id.to_string());
    meta.insert("section_title".to_string(), section_title.to_string());
    meta
}

/// Text of a markdown header of exactly `level` markers, e.g. `## Skills`.
fn header_text(line: &str, level: usize) -> Option<&str> {
    let markers = line.bytes().take_while(|b| *b == b'#').count();
    if markers != level {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let text = rest.trim();
    (!text.is_empty()).then_some(text)
}
