use serde::{Deserialize, Serialize};

/// A hyperlink found in the main zone.
///
/// `raw` is the literal rendered text; `text` is always derived from `raw`
/// and the declared charset, never the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
    pub raw: String,
}

/// One unit of extracted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Element name, `script:`-prefixed when the block came from injected markup.
    pub tag: String,
    /// Encoding-corrected, cleaned text. Never contains link text.
    pub text: String,
    /// Rendered text before encoding correction.
    pub raw: String,
    pub links: Vec<Link>,
}

impl ContentBlock {
    /// A block holding only an anchor that had no block-level parent.
    pub fn standalone(link: Link) -> Self {
        Self {
            tag: "a".to_string(),
            text: String::new(),
            raw: String::new(),
            links: vec![link],
        }
    }

    /// Marks the block as originating from script-injected markup.
    pub(crate) fn into_script_block(mut self) -> Self {
        self.tag = format!("script:{}", self.tag);
        self
    }
}
