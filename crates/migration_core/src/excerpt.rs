/// Default excerpt length, in characters.
pub const DEFAULT_EXCERPT_LIMIT: usize = 170;

/// Collapses every whitespace run into a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shortens `text` to at most `limit` characters plus an ellipsis.
///
/// Whitespace is collapsed first. Text of `limit` characters or fewer is
/// returned unchanged; longer text is cut at the last word boundary that
/// fits and gets `...` appended.
pub fn truncate_excerpt(text: &str, limit: usize) -> String {
    let cleaned = collapse_whitespace(text);
    if cleaned.chars().count() <= limit {
        return cleaned;
    }

    let cut = cleaned
        .char_indices()
        .nth(limit)
        .map(|(idx, _)| idx)
        .unwrap_or(cleaned.len());
    let (prefix, rest) = cleaned.split_at(cut);

    let kept = if rest.starts_with(' ') {
        prefix
    } else {
        match prefix.rfind(' ') {
            Some(space) if space > 0 => &prefix[..space],
            _ => prefix,
        }
    };

    format!("{}...", kept.trim_end())
}
