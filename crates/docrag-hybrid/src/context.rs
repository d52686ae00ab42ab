use docrag_core::types::SearchResult;

pub const NO_CONTEXT: &str = "No relevant context found.";
pub const DEFAULT_MAX_CHARS: usize = 4000;

// Room kept per entry beyond header and content.
const ENTRY_SLACK: usize = 10;
// Entries with less content room than this are not rendered.
const MIN_CONTENT_ROOM: usize = 100;

/// Render ranked results as prompt context within a `max_chars` budget.
///
/// Each entry is `"[{rank}. {source_type}] (score: {combined:.2})\n{content}\n"`;
/// entries are joined with a blank line. Lengths count characters.
pub fn format_context(results: &[SearchResult], max_chars: usize) -> String {
    if results.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let mut parts = Vec::new();
    let mut used = 0usize;
    for (i, result) in results.iter().enumerate() {
        let header = format!("[{}. {}] (score: {:.2})", i + 1, result.source_type, result.combined_score);
        let available = max_chars
            .saturating_sub(used)
            .saturating_sub(header.chars().count())
            .saturating_sub(ENTRY_SLACK);
        if available <= MIN_CONTENT_ROOM {
            break;
        }
        let content = truncate_chars(&result.content, available);
        let entry = format!("{header}\n{content}\n");
        used += entry.chars().count();
        parts.push(entry);
    }
    parts.join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
