//! Derivation of cleaned text from rendered text.

use std::borrow::Cow;

use crate::consts;
use crate::correct::correct;

/// Collapses every run of whitespace to a single space.
pub(crate) fn collapse(text: &str) -> Cow<'_, str> {
    consts::WHITESPACE_REGEX.replace_all(text, " ")
}

/// Finalises rendered text into the `raw` field.
pub(crate) fn finish_raw(raw: &str, collapse_whitespace: bool) -> String {
    if collapse_whitespace {
        collapse(raw).trim().to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Derives `text` from `raw`: encoding correction, then removal of residual
/// markup garbage, then whitespace cleanup. A pure function of its inputs.
pub(crate) fn derive(raw: &str, charset: &str, collapse_whitespace: bool) -> String {
    let corrected = correct(raw, charset);
    let stripped = consts::HTML_GARBAGE_REGEX.replace_all(&corrected, "");
    finish_raw(&stripped, collapse_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Hello", "utf-8", "Hello")]
    #[case("  Safe  \n text ", "utf-8", "Safe text")]
    #[case("CrÃ¨me", "windows-1252", "Crème")]
    #[case("Oops <<<< /p> done", "utf-8", "Oops done")]
    #[case("<< b>>bold", "utf-8", ">bold")]
    #[case("1 < 2", "utf-8", "1 < 2")]
    #[case("a <3 b", "utf-8", "a <3 b")]
    #[case("x < /p> y", "utf-8", "x y")]
    fn test_derive(#[case] raw: &str, #[case] charset: &str, #[case] expected: &str) {
        assert_eq!(derive(raw, charset, true), expected);
    }

    #[test]
    fn test_derive_without_collapse_keeps_inner_whitespace() {
        assert_eq!(derive(" a  b\n", "utf-8", false), "a  b");
    }
}
