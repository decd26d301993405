//! Byte-level charset resolution.
//!
//! Finds the charset a document declares about itself, maps it the way a
//! browser would, and decodes the bytes. Decoding never fails: byte sequences
//! that are invalid under the resolved charset become U+FFFD.

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252, X_USER_DEFINED};
use tracing::instrument;

use crate::consts;

/// Browser charset remapping applied before label lookup.
///
/// Every browser treats `iso-8859-1` as `windows-1252`: the two agree on
/// 0x00-0x7F but windows-1252 defines printable characters in 0x80-0x9F.
/// Decoding has to match, or the text will not look like what users see.
const ALIASES: &[(&str, &str)] = &[
    ("iso-8859-1", "windows-1252"),
    ("iso8859-1", "windows-1252"),
    ("iso88591", "windows-1252"),
    ("latin-1", "windows-1252"),
    ("latin1", "windows-1252"),
    ("us-ascii", "windows-1252"),
    ("ascii", "windows-1252"),
    ("iso-8859-9", "windows-1254"),
    ("iso-8859-11", "windows-874"),
];

/// The charset assumed when a document declares nothing usable.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// A decoded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The document text.
    pub text: String,
    /// Lowercase name of the charset the bytes were decoded with.
    pub charset: String,
    /// Problems noticed while resolving or decoding.
    pub warnings: Vec<String>,
}

/// Maps a declared label through the browser alias table.
///
/// The result is lowercase and trimmed; labels without an alias pass
/// through unchanged.
pub fn alias(label: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(from, _)| *from == label)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(label)
}

/// Looks up the encoding for a charset name, after aliasing.
pub(crate) fn encoding_for(charset: &str) -> Option<&'static Encoding> {
    Encoding::for_label(alias(charset).as_bytes())
}

/// Returns the charset declared in the first 2048 bytes, if any.
///
/// Recognises both `<meta charset="...">` and the legacy
/// `<meta http-equiv="Content-Type" content="...; charset=...">`. The
/// returned label is aliased but not validated.
pub fn declared(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(consts::CHARSET_SCAN_BYTES)];
    let captures = consts::META_CHARSET_REGEX
        .captures(head)
        .or_else(|| consts::META_CONTENT_CHARSET_REGEX.captures(head))?;
    let label = String::from_utf8_lossy(captures.get(1)?.as_bytes()).into_owned();
    Some(alias(&label))
}

/// What a browser's prescan makes of an encoding named by a `<meta>` tag.
///
/// A declaration found by scanning bytes as ASCII cannot truthfully claim
/// UTF-16, so it means UTF-8; `x-user-defined` is read as windows-1252.
fn declarable(encoding: &'static Encoding) -> &'static Encoding {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        UTF_8
    } else if encoding == X_USER_DEFINED {
        WINDOWS_1252
    } else {
        encoding
    }
}

/// Resolves the charset of `bytes` and decodes them.
///
/// A byte order mark takes precedence over any declaration. Unknown
/// labels fall back to UTF-8 with a warning.
#[instrument(skip(bytes), fields(size = bytes.len(), charset))]
pub fn resolve(bytes: &[u8]) -> Decoded {
    let mut warnings = Vec::new();
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None => match declared(bytes) {
            Some(label) => encoding_for(&label).map(declarable).unwrap_or_else(|| {
                warnings.push(format!("Unknown charset '{label}', decoding as UTF-8"));
                UTF_8
            }),
            None => UTF_8,
        },
    };
    let (text, used, malformed) = encoding.decode(bytes);
    let charset = used.name().to_ascii_lowercase();
    if malformed {
        warnings.push(format!("Replaced invalid byte sequences while decoding as {charset}"));
    }
    tracing::Span::current().record("charset", charset.as_str());
    Decoded {
        text: text.into_owned(),
        charset,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ISO-8859-1", "windows-1252")]
    #[case(" latin1 ", "windows-1252")]
    #[case("US-ASCII", "windows-1252")]
    #[case("iso-8859-9", "windows-1254")]
    #[case("iso-8859-11", "windows-874")]
    #[case("Shift_JIS", "shift_jis")]
    #[case("utf-8", "utf-8")]
    fn test_alias(#[case] label: &str, #[case] expected: &str) {
        assert_eq!(alias(label), expected);
    }

    #[rstest]
    #[case(br#"<html><head><meta charset="ISO-8859-1"></head>"#.as_slice(), Some("windows-1252"))]
    #[case(b"<meta charset=utf-8>".as_slice(), Some("utf-8"))]
    #[case(
        br#"<meta http-equiv="Content-Type" content="text/html; charset=windows-1251">"#.as_slice(),
        Some("windows-1251")
    )]
    #[case(b"<html><body>nothing declared</body></html>".as_slice(), None)]
    fn test_declared(#[case] bytes: &[u8], #[case] expected: Option<&str>) {
        assert_eq!(declared(bytes).as_deref(), expected);
    }

    #[test]
    fn test_declaration_after_scan_window_is_ignored() {
        let mut bytes = vec![b' '; consts::CHARSET_SCAN_BYTES];
        bytes.extend_from_slice(br#"<meta charset="iso-8859-1">"#);
        assert_eq!(declared(&bytes), None);
        assert_eq!(resolve(&bytes).charset, "utf-8");
    }

    #[test]
    fn test_declaration_survives_non_ascii_prefix() {
        let bytes = b"<!-- \xff\xfe --><meta charset=\"latin1\">";
        assert_eq!(declared(bytes).as_deref(), Some("windows-1252"));
    }

    #[test]
    fn test_resolve_defaults_to_utf8() {
        let decoded = resolve("<p>Crème</p>".as_bytes());
        assert_eq!(decoded.charset, "utf-8");
        assert_eq!(decoded.text, "<p>Crème</p>");
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_resolve_latin1_as_windows_1252() {
        // 0x93/0x94 are curly quotes in windows-1252 but C1 controls in latin-1.
        let bytes = b"<meta charset=\"iso-8859-1\"><p>\x93Cr\xe8me\x94</p>";
        let decoded = resolve(bytes);
        assert_eq!(decoded.charset, "windows-1252");
        assert!(decoded.text.ends_with("<p>\u{201c}Crème\u{201d}</p>"));
    }

    #[test]
    fn test_resolve_mojibake_is_preserved() {
        // UTF-8 bytes for "è" declared as latin-1 decode to "Ã¨".
        let bytes = b"<meta charset=\"iso-8859-1\"><p>Cr\xc3\xa8me</p>";
        let decoded = resolve(bytes);
        assert!(decoded.text.contains("CrÃ¨me"));
    }

    #[test]
    fn test_resolve_bom_overrides_declaration() {
        let bytes = b"\xef\xbb\xbf<meta charset=\"iso-8859-1\"><p>Cr\xc3\xa8me</p>";
        let decoded = resolve(bytes);
        assert_eq!(decoded.charset, "utf-8");
        assert!(decoded.text.contains("Crème"));
    }

    #[test]
    fn test_resolve_invalid_bytes_are_replaced() {
        let decoded = resolve(b"<p>bad \xff byte</p>");
        assert_eq!(decoded.text, "<p>bad \u{fffd} byte</p>");
        assert_eq!(decoded.warnings.len(), 1);
    }

    #[rstest]
    #[case("utf-16", "utf-8")]
    #[case("UTF-16BE", "utf-8")]
    #[case("utf-16le", "utf-8")]
    #[case("x-user-defined", "windows-1252")]
    fn test_resolve_meta_declarations_follow_prescan(#[case] label: &str, #[case] expected: &str) {
        let bytes = format!("<meta charset=\"{label}\"><body><p>Hello</p>");
        let decoded = resolve(bytes.as_bytes());
        assert_eq!(decoded.charset, expected);
        assert!(decoded.text.ends_with("<p>Hello</p>"));
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_resolve_utf16_bom_is_honoured() {
        let bytes: Vec<u8> = [0xff, 0xfe]
            .into_iter()
            .chain("<p>Hi</p>".encode_utf16().flat_map(u16::to_le_bytes))
            .collect();
        let decoded = resolve(&bytes);
        assert_eq!(decoded.charset, "utf-16le");
        assert_eq!(decoded.text, "<p>Hi</p>");
    }

    #[test]
    fn test_resolve_unknown_label_warns() {
        let decoded = resolve(b"<meta charset=\"x-klingon\"><p>Qapla'</p>");
        assert_eq!(decoded.charset, "utf-8");
        assert!(decoded.warnings[0].contains("x-klingon"));
    }
}
