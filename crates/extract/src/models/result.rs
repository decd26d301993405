use serde::{Deserialize, Serialize};

use super::ContentBlock;

/// Everything extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Blocks in document order, script-injected blocks last.
    pub blocks: Vec<ContentBlock>,
    /// Human-readable notes on everything that was repaired or skipped.
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    /// Every link across all blocks, in order.
    pub fn links(&self) -> impl Iterator<Item = &super::Link> {
        self.blocks.iter().flat_map(|block| block.links.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Link;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let result = ExtractionResult {
            blocks: vec![ContentBlock::standalone(Link {
                href: "/home".to_string(),
                text: "Home".to_string(),
                raw: "Home".to_string(),
            })],
            warnings: vec!["Fixed malformed attributes (double equals)".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "blocks": [{
                    "tag": "a",
                    "text": "",
                    "raw": "",
                    "links": [{ "href": "/home", "text": "Home", "raw": "Home" }],
                }],
                "warnings": ["Fixed malformed attributes (double equals)"],
            })
        );
    }
}
