/// Normalise a product title for case- and spacing-insensitive matching.
///
/// Runs of whitespace collapse to a single space, the ends are trimmed, and
/// the result is lowercased. Returns `None` when nothing is left.
pub fn normalize_title(title: &str) -> Option<String> {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.to_lowercase())
}
