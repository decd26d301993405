use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
    (bytes $name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<BytesRegex> = LazyLock::new(|| BytesRegex::new($regex).unwrap());
    };
}

/// Elements that represent a standalone content unit. Each one that survives
/// exclusion becomes its own block. `div` is included because many sites use
/// it where a semantic tag belongs.
pub(crate) const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "blockquote", "figcaption", "dt", "dd", "caption",
    "div", "pre",
];
/// Elements that carry a link target.
pub(crate) const LINK_TAGS: &[&str] = &["a", "area"];
/// Elements whose content a browser never renders as text.
pub(crate) const NON_RENDERED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that never take a closing tag.
pub(crate) const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];
/// Elements whose stray closing tags are reported as anomalies.
pub(crate) const ORPHAN_CHECK_TAGS: &[&str] = &["span", "div", "p", "footer", "section"];
/// Inline event handler attributes that hint at script interaction.
pub(crate) const EVENT_HANDLERS: &[&str] = &["onclick", "onload", "onerror", "onmouseover"];

/// How far into the byte stream a charset declaration is searched for.
pub(crate) const CHARSET_SCAN_BYTES: usize = 2048;

// Charset declarations, matched against raw bytes so that non-ASCII noise
// ahead of the declaration cannot break the scan.
regex!(bytes META_CHARSET_REGEX, r#"(?i-u)<meta[^>]+charset=["']?\s*([^\s"';>]+)"#);
regex!(bytes META_CONTENT_CHARSET_REGEX, r#"(?i-u)<meta[^>]+content=["'][^"']*charset=([^\s"';>]+)"#);

// Sanitizer repairs.
regex!(DOUBLE_BRACKET_REGEX, r"<{2,}(/?[a-zA-Z][a-zA-Z0-9:-]*(?:\s[^<>]*)?)>{2,}");
regex!(TAG_SPAN_REGEX, r"<[a-zA-Z][^<>]*>");
regex!(DOUBLE_EQUALS_REGEX, r#"([\w:-])==(["'])"#);

// Tag tokens counted by anomaly detection.
regex!(START_TAG_REGEX, r"<([a-zA-Z][a-zA-Z0-9-]*)");
regex!(CLOSE_TAG_REGEX, r"</([a-zA-Z][a-zA-Z0-9-]*)\s*>");

// Inline styles that hide an element.
regex!(HIDDEN_STYLE_REGEX, r"(?i)display\s*:\s*none|visibility\s*:\s*hidden");

// Residual markup that survives parsing as literal text, e.g. `<<<< /p>`.
// A lone `<` only counts when it is closed, so `1 < 2` keeps its operand.
regex!(HTML_GARBAGE_REGEX, r"<{2,}\s*/?\w*\s*>?|<\s*/?\w*\s*>");
regex!(WHITESPACE_REGEX, r"\s+");

// String literals handed to `document.write()`/`document.writeln()`.
regex!(
    DOCUMENT_WRITE_REGEX,
    r#"(?is)document\s*\.\s*write(?:ln)?\s*\(\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')\s*\)"#
);

selector!(BODY_SELECTOR, "body");
selector!(SCRIPT_SELECTOR, "script");
