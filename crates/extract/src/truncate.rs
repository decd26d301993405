//! Truncation of documents handed to the analyzer.

use std::borrow::Cow;

use memchr::memrchr;

/// Default budget for the HTML shown to the analyzer.
pub const DEFAULT_ANALYSIS_BYTES: usize = 15_000;

/// Marker appended to a document that was cut short.
pub const TRUNCATION_MARKER: &str = "<!-- TRUNCATED -->";

/// Cuts `html` to at most `max_bytes` at a safe-ish boundary and marks the cut.
///
/// The cut never falls inside a tag, an entity or a multi-byte character.
/// Documents within budget are returned untouched.
///
/// ```rust
/// use salvage_extract::truncate_for_analysis;
/// let html = "<div>Hello World</div><p>More</p>";
/// assert_eq!(truncate_for_analysis(html, 100), html);
/// assert_eq!(truncate_for_analysis(html, 24), "<div>Hello World</div><!-- TRUNCATED -->");
/// ```
pub fn truncate_for_analysis(html: &str, max_bytes: usize) -> Cow<'_, str> {
    if html.len() <= max_bytes {
        return Cow::Borrowed(html);
    }
    let mut end = max_bytes;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    let end = safe_boundary(&html.as_bytes()[..end]);
    Cow::Owned(format!("{}{TRUNCATION_MARKER}", &html[..end]))
}

/// Length of the longest prefix of `candidate` that does not end inside a
/// tag or an entity. `<`, `>`, `&` and `;` are ASCII, so every returned
/// length is a char boundary of the original text.
fn safe_boundary(candidate: &[u8]) -> usize {
    let open_tag = memrchr(b'<', candidate);
    let close_tag = memrchr(b'>', candidate);
    if let Some(open) = open_tag
        && close_tag.is_none_or(|close| close < open)
    {
        return open;
    }
    let entity_start = memrchr(b'&', candidate);
    let entity_end = memrchr(b';', candidate);
    if let Some(amp) = entity_start
        && entity_end.is_none_or(|semi| semi < amp)
    {
        return amp;
    }
    candidate.len()
}
