use crate::error::{ErrorKind, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Bytes of a document that feed its content-derived key.
const HASHED_PREFIX_BYTES: usize = 10_000;
/// Hex characters kept from the BLAKE3 digest.
const HASH_KEY_LENGTH: usize = 12;

/// Names one cache entry; doubles as its file stem on disk.
///
/// Keys are built from a human-readable source name when one is known, so the
/// cache directory stays easy to audit. Otherwise the leading bytes of the
/// document are hashed: the structure a selector targets is almost always
/// settled in the first few kilobytes.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Sanitizes a source name (usually a file name) into a key.
    ///
    /// Alphanumerics, `-`, `_` and `.` are kept, everything else becomes `_`,
    /// and a trailing `.html` or `.htm` is dropped.
    ///
    /// ```rust
    /// use salvage_cache::DocumentKey;
    /// let key = DocumentKey::from_source("news/front page.html").unwrap();
    /// assert_eq!(key.as_str(), "news_front_page");
    /// ```
    pub fn from_source(name: &str) -> Result<Self> {
        let safe: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        let stem = safe
            .strip_suffix(".html")
            .or_else(|| safe.strip_suffix(".htm"))
            .unwrap_or(&safe);
        Self::parse(stem)
    }

    /// Derives a key from the first 10 000 bytes of a document.
    pub fn from_html(html: impl AsRef<[u8]>) -> Self {
        let html = html.as_ref();
        let sample = &html[..html.len().min(HASHED_PREFIX_BYTES)];
        let mut hex = blake3::hash(sample).to_hex().to_string();
        hex.truncate(HASH_KEY_LENGTH);
        Self(hex)
    }

    /// Picks the key for a document: its source name when given, otherwise
    /// its content hash.
    pub fn for_document(html: impl AsRef<[u8]>, source_name: Option<&str>) -> Result<Self> {
        match source_name {
            Some(name) => Self::from_source(name),
            None => Ok(Self::from_html(html)),
        }
    }

    /// Validates an existing key, such as one typed on the command line or
    /// read back from a file name.
    pub fn parse(key: &str) -> Result<Self> {
        if !is_valid(key) {
            exn::bail!(ErrorKind::InvalidKey(key.to_string()));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && key.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl AsRef<str> for DocumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentKey {
    type Error = ErrorKind;
    fn try_from(key: String) -> std::result::Result<Self, Self::Error> {
        if !is_valid(&key) {
            return Err(ErrorKind::InvalidKey(key));
        }
        Ok(Self(key))
    }
}

impl From<DocumentKey> for String {
    fn from(key: DocumentKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("page.html", "page")]
    #[case("page.htm", "page")]
    #[case("archive.tar.gz", "archive.tar.gz")]
    #[case("my page (1).html", "my_page__1_")]
    #[case("../../etc/passwd", ".._.._etc_passwd")]
    #[case("café-menu_v2", "café-menu_v2")]
    fn test_from_source(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(DocumentKey::from_source(name).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(".html")]
    #[case("..")]
    fn test_from_source_rejects_empty_stems(#[case] name: &str) {
        let error = DocumentKey::from_source(name).unwrap_err();
        assert!(matches!(&*error, ErrorKind::InvalidKey(_)));
    }

    #[rstest]
    #[case("a/b")]
    #[case("with space")]
    #[case(".")]
    fn test_parse_rejects(#[case] key: &str) {
        assert!(DocumentKey::parse(key).is_err());
    }

    #[test]
    fn test_from_html_hashes_prefix_only() {
        let key = DocumentKey::from_html("<html><body><p>Hello</p></body></html>");
        assert_eq!(key.as_str().len(), 12);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        let skeleton = "<div>".repeat(2_000);
        let a = DocumentKey::from_html(format!("{skeleton}<p>first body</p>"));
        let b = DocumentKey::from_html(format!("{skeleton}<p>second body</p>"));
        assert_eq!(a, b);
        assert_ne!(a, key);
    }

    #[test]
    fn test_for_document_prefers_source_name() {
        let html = "<p>x</p>";
        assert_eq!(DocumentKey::for_document(html, Some("x.html")).unwrap().as_str(), "x");
        assert_eq!(DocumentKey::for_document(html, None).unwrap(), DocumentKey::from_html(html));
    }

    #[test]
    fn test_serde_validates() {
        let key: DocumentKey = serde_json::from_str("\"page\"").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"page\"");
        assert!(serde_json::from_str::<DocumentKey>("\"a/b\"").is_err());
    }
}
