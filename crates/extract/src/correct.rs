//! Per-text mojibake recovery.

use encoding_rs::UTF_8;

use crate::charset;

/// Undoes a charset mismatch on a piece of extracted text.
///
/// Mojibake arises when UTF-8 bytes were decoded with a single-byte legacy
/// charset. Encoding `raw` back with `charset` recovers those bytes; if they
/// form valid UTF-8 that is the intended text. Any failure along the way
/// returns `raw` unchanged. For UTF-8 this is the identity.
pub fn correct(raw: &str, charset: &str) -> String {
    let Some(encoding) = charset::encoding_for(charset) else {
        return raw.to_string();
    };
    if encoding == UTF_8 || raw.is_ascii() {
        return raw.to_string();
    }
    let (bytes, _, unmappable) = encoding.encode(raw);
    if unmappable {
        return raw.to_string();
    }
    match std::str::from_utf8(&bytes) {
        Ok(corrected) => corrected.to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CrÃ¨me", "windows-1252", "Crème")]
    #[case("CrÃ¨me", "iso-8859-1", "Crème")]
    #[case("â€œquotedâ€\u{9d}", "windows-1252", "\u{201c}quoted\u{201d}")]
    #[case("Crème", "windows-1252", "Crème")]
    #[case("plain ascii", "windows-1252", "plain ascii")]
    #[case("Привет", "windows-1252", "Привет")]
    #[case("CrÃ¨me", "x-unknown", "CrÃ¨me")]
    fn test_correct(#[case] raw: &str, #[case] charset: &str, #[case] expected: &str) {
        assert_eq!(correct(raw, charset), expected);
    }

    #[rstest]
    #[case("CrÃ¨me")]
    #[case("Привет, мир")]
    #[case("\u{fffd} odd \u{0} bytes")]
    fn test_utf8_is_identity(#[case] raw: &str) {
        assert_eq!(correct(raw, "utf-8"), raw);
        assert_eq!(correct(raw, "UTF-8"), raw);
    }
}
