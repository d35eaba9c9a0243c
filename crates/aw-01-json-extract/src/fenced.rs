//! Fenced code block extraction.

use std::borrow::Cow;

const FENCE: &str = "```";

/// Interior of the first fenced block labelled `json`, trimmed.
///
/// The label match is ASCII case-insensitive. Returns `None` when there is no
/// such block or it is never closed.
#[must_use]
pub fn extract_fenced_json(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(found) = text.get(search_from..)?.find(FENCE) {
        let label_start = search_from + found + FENCE.len();
        let rest = text.get(label_start..)?;
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let label = rest.get(..line_end)?.trim();

        if label.eq_ignore_ascii_case("json") {
            let body_start = label_start + line_end;
            let body = text.get(body_start..)?;
            let close = body.find(FENCE)?;
            return body.get(..close).map(str::trim);
        }

        search_from = label_start;
    }
    None
}

/// The output a caller should see for a given result text.
///
/// Text that already starts with `{` or `[` is returned as is. Otherwise, if
/// it contains a fenced `json` block, the block's interior is returned.
/// Anything else is returned unchanged.
#[must_use]
pub fn effective_output(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Cow::Borrowed(text);
    }
    match extract_fenced_json(text) {
        Some(inner) => Cow::Owned(inner.to_string()),
        None => Cow::Borrowed(text),
    }
}
