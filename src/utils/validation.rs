//! Accepted-type validation
//!
//! Strict mode compares the declared media type against the raw accept
//! string with a substring test. `text/csv` passes for `.csv, text/csv`, and
//! so does `text/cs`: the check is deliberately loose.

/// Whether `media_type` passes the strict-mode check against `accept`
///
/// An empty declared type never passes.
pub fn accepts_media_type(accept: &str, media_type: &str) -> bool {
    !media_type.is_empty() && accept.contains(media_type)
}

/// Split an accept string into its comma separated entries
pub fn accept_entries(accept: &str) -> Vec<&str> {
    accept
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Whether `name` can be written as an HTML attribute name as-is
///
/// Rejects empty names, whitespace, quotes, `<`, `>`, `/`, `=` and control
/// characters.
pub fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '"' | '\'' | '<' | '>' | '/' | '=')
        })
}
