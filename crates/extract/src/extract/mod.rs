//! Content block extraction from resolved zones.

mod text;

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node};
use tracing::instrument;

pub(crate) use self::text::{collapse, derive};
use crate::consts;
use crate::exclusion::{ExclusionSet, is_hidden};
use crate::models::{ContentBlock, ExtractionHints, Link};

/// Walks zones of a parsed document and emits content blocks.
///
/// Each block-level element becomes one block holding its *own* text:
/// nested block-level elements form their own blocks, and text inside links
/// belongs to the links. Anchors with no block-level ancestor inside the zone
/// become standalone blocks so that no link is lost.
#[derive(Debug)]
pub struct Extractor<'a> {
    document: &'a Html,
    excluded: &'a ExclusionSet,
    hints: ExtractionHints,
    charset: &'a str,
}

impl<'a> Extractor<'a> {
    pub fn new(document: &'a Html, excluded: &'a ExclusionSet, hints: ExtractionHints, charset: &'a str) -> Self {
        Self {
            document,
            excluded,
            hints,
            charset,
        }
    }

    /// Extracts every block under the given roots, in document order.
    #[instrument(skip_all, fields(roots = roots.len(), blocks))]
    pub fn blocks(&self, roots: &[NodeId]) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();
        for root in roots.iter().filter_map(|id| self.document.tree.get(*id)) {
            self.walk(root, &mut blocks);
        }
        tracing::Span::current().record("blocks", blocks.len());
        blocks
    }

    fn walk(&self, root: NodeRef<'a, Node>, blocks: &mut Vec<ContentBlock>) {
        // (node, whether a block-level ancestor inside the zone owns it)
        let mut stack = vec![(root, false)];
        while let Some((node, owned)) = stack.pop() {
            let Some(element) = ElementRef::wrap(node) else {
                continue;
            };
            if self.skipped(element) {
                continue;
            }
            let name = element.value().name();
            if consts::LINK_TAGS.contains(&name)
                && let Some(link) = self.link(element)
            {
                if !owned {
                    blocks.push(ContentBlock::standalone(link));
                }
                // Block-level elements a lenient parser nested inside a link
                // are part of the link's text, not blocks of their own.
                continue;
            }
            let is_block = consts::BLOCK_TAGS.contains(&name);
            if is_block && let Some(block) = self.block(element) {
                blocks.push(block);
            }
            stack.extend(node.children().rev().map(|child| (child, owned || is_block)));
        }
    }

    /// Excluded by selector, hidden by inline style, or never rendered.
    fn skipped(&self, element: ElementRef<'_>) -> bool {
        self.excluded.contains(element.id())
            || is_hidden(element.value())
            || consts::NON_RENDERED_TAGS.contains(&element.value().name())
    }

    /// Builds the block for one block-level element, or `None` when it has
    /// neither text nor links of its own.
    fn block(&self, element: ElementRef<'a>) -> Option<ContentBlock> {
        let mut raw = String::new();
        let mut links = Vec::new();
        let mut stack: Vec<NodeRef<'a, Node>> = element.children().rev().collect();
        while let Some(node) = stack.pop() {
            let child = match node.value() {
                Node::Text(text) => {
                    raw.push_str(text);
                    continue;
                },
                Node::Element(_) => match ElementRef::wrap(node) {
                    Some(child) => child,
                    None => continue,
                },
                _ => continue,
            };
            if self.skipped(child) {
                continue;
            }
            let name = child.value().name();
            if consts::BLOCK_TAGS.contains(&name) {
                continue;
            }
            if consts::LINK_TAGS.contains(&name)
                && let Some(link) = self.link(child)
            {
                links.push(link);
                continue;
            }
            match name {
                "img" if self.hints.include_alt_text => {
                    if let Some(alt) = child.value().attr("alt").filter(|alt| !alt.trim().is_empty()) {
                        raw.push(' ');
                        raw.push_str(alt);
                        raw.push(' ');
                    }
                },
                "br" => raw.push('\n'),
                _ => {},
            }
            stack.extend(node.children().rev());
        }

        let raw = text::finish_raw(&raw, self.hints.collapse_whitespace);
        if raw.is_empty() && links.is_empty() {
            return None;
        }
        Some(ContentBlock {
            tag: element.value().name().to_string(),
            text: derive(&raw, self.charset, self.hints.collapse_whitespace),
            raw,
            links,
        })
    }

    /// Builds a link, or `None` when the anchor has no usable target.
    ///
    /// Link text joins its text nodes with a space: a lenient parser may
    /// split one run of link text across several nodes when it repairs bad
    /// nesting, and those fragments must not run together.
    fn link(&self, element: ElementRef<'a>) -> Option<Link> {
        let href = element.value().attr("href")?.trim();
        if href.is_empty() || href == "#" || href.to_ascii_lowercase().starts_with("javascript:") {
            return None;
        }

        let mut parts: Vec<&str> = Vec::new();
        let mut alt = element.value().attr("alt");
        let mut stack: Vec<NodeRef<'a, Node>> = element.children().rev().collect();
        while let Some(node) = stack.pop() {
            match node.value() {
                Node::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        parts.push(text);
                    }
                },
                Node::Element(inner) => {
                    let Some(child) = ElementRef::wrap(node) else {
                        continue;
                    };
                    if self.skipped(child) {
                        continue;
                    }
                    if inner.name() == "img" && alt.is_none() {
                        alt = inner.attr("alt");
                    }
                    stack.extend(node.children().rev());
                },
                _ => {},
            }
        }

        let mut raw = parts.join(" ");
        if raw.is_empty() && self.hints.include_alt_text {
            raw = alt.unwrap_or_default().trim().to_string();
        }
        if self.hints.collapse_whitespace {
            raw = collapse(&raw).into_owned();
        }
        Some(Link {
            href: href.to_string(),
            text: derive(&raw, self.charset, self.hints.collapse_whitespace),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones;
    use rstest::rstest;

    fn extract_body(html: &str) -> Vec<ContentBlock> {
        extract_with(html, ExtractionHints::default(), "utf-8")
    }

    fn extract_with(html: &str, hints: ExtractionHints, charset: &str) -> Vec<ContentBlock> {
        let document = Html::parse_document(html);
        let excluded = ExclusionSet::default();
        Extractor::new(&document, &excluded, hints, charset).blocks(&[zones::body(&document)])
    }

    fn block(tag: &str, text: &str, links: Vec<Link>) -> ContentBlock {
        ContentBlock {
            tag: tag.to_string(),
            text: text.to_string(),
            raw: text.to_string(),
            links,
        }
    }

    fn link(href: &str, text: &str) -> Link {
        Link {
            href: href.to_string(),
            text: text.to_string(),
            raw: text.to_string(),
        }
    }

    #[test]
    fn test_blocks_in_document_order() {
        let blocks = extract_body("<h1>Title</h1><p>One</p><ul><li>A</li><li>B</li></ul><blockquote>Q</blockquote>");
        assert_eq!(
            blocks,
            vec![
                block("h1", "Title", vec![]),
                block("p", "One", vec![]),
                block("li", "A", vec![]),
                block("li", "B", vec![]),
                block("blockquote", "Q", vec![]),
            ]
        );
    }

    #[test]
    fn test_link_text_is_not_block_text() {
        let blocks = extract_body(r#"<p>Read <a href="/more">more <b>here</b></a> now.</p>"#);
        assert_eq!(blocks, vec![block("p", "Read now.", vec![link("/more", "more here")])]);
    }

    #[test]
    fn test_nested_blocks_are_not_duplicated() {
        let blocks = extract_body("<div>Intro<p>Para</p><div><p>Deep</p></div></div>");
        assert_eq!(
            blocks,
            vec![block("div", "Intro", vec![]), block("p", "Para", vec![]), block("p", "Deep", vec![])]
        );
    }

    #[test]
    fn test_hidden_content_is_skipped_at_every_level() {
        let blocks = extract_body(
            r#"<p style="display:none">Hidden block</p>
               <p>Safe <span style="display:none">hidden</span> text
                  <a href="/secret" style="visibility:hidden">secret</a>
                  <a href="/open">open<span style="display: none"> nope</span></a></p>"#,
        );
        assert_eq!(blocks, vec![block("p", "Safe text", vec![link("/open", "open")])]);
    }

    #[test]
    fn test_standalone_links() {
        let blocks = extract_body(r#"<nav><a href="/a">A</a> <span><a href="/b">B</a></span></nav><p>P</p>"#);
        assert_eq!(
            blocks,
            vec![
                ContentBlock::standalone(link("/a", "A")),
                ContentBlock::standalone(link("/b", "B")),
                block("p", "P", vec![]),
            ]
        );
    }

    #[rstest]
    #[case(r##"<a href="#">Top</a>"##)]
    #[case(r#"<a href="javascript:void(0)">Click</a>"#)]
    #[case(r#"<a href="  ">Blank</a>"#)]
    #[case(r#"<a name="anchor">Named</a>"#)]
    fn test_unusable_links_are_ignored(#[case] html: &str) {
        assert!(extract_body(html).iter().all(|block| block.links.is_empty()));
    }

    #[test]
    fn test_anchor_without_target_is_inline_text() {
        let blocks = extract_body(r#"<p>See <a name="x">here</a>.</p>"#);
        assert_eq!(blocks, vec![block("p", "See here.", vec![])]);
    }

    #[test]
    fn test_split_link_text_is_space_joined() {
        let blocks = extract_body("<a href='x'>Broken Link<p>Oops");
        assert_eq!(blocks, vec![ContentBlock::standalone(link("x", "Broken Link Oops"))]);
    }

    #[test]
    fn test_alt_text() {
        let html = r#"<p>Logo <img alt="ACME" src="a.png"> Inc</p><p><a href="/"><img alt="Home"></a></p>"#;
        assert_eq!(
            extract_body(html),
            vec![block("p", "Logo ACME Inc", vec![]), block("p", "", vec![link("/", "Home")])]
        );
        let hints = ExtractionHints {
            include_alt_text: false,
            ..Default::default()
        };
        assert_eq!(
            extract_with(html, hints, "utf-8"),
            vec![block("p", "Logo Inc", vec![]), block("p", "", vec![link("/", "")])]
        );
    }

    #[test]
    fn test_whitespace_is_kept_when_not_collapsing() {
        let hints = ExtractionHints {
            collapse_whitespace: false,
            ..Default::default()
        };
        let blocks = extract_with("<pre>  a\n  b  </pre>", hints, "utf-8");
        assert_eq!(blocks, vec![block("pre", "a\n  b", vec![])]);
    }

    #[test]
    fn test_encoding_correction_applies_to_text_only() {
        let blocks = extract_with(
            r#"<p>CrÃ¨me <a href="/c">brÃ»lÃ©e</a></p>"#,
            ExtractionHints::default(),
            "windows-1252",
        );
        assert_eq!(
            blocks,
            vec![ContentBlock {
                tag: "p".to_string(),
                text: "Crème".to_string(),
                raw: "CrÃ¨me".to_string(),
                links: vec![Link {
                    href: "/c".to_string(),
                    text: "brûlée".to_string(),
                    raw: "brÃ»lÃ©e".to_string(),
                }],
            }]
        );
    }

    #[test]
    fn test_excluded_and_non_rendered_nodes_are_skipped() {
        let document = Html::parse_document(
            r#"<body><div class="ad"><p>Buy</p><a href="/buy">Buy</a></div>
               <p>Keep<script>var x = 1;</script><style>p {}</style></p><noscript><p>No JS</p></noscript></body>"#,
        );
        let exclude = crate::models::SelectorList {
            css: vec![".ad".to_string()],
            xpath: vec![],
        };
        let (excluded, _) = ExclusionSet::build(&document, &exclude);
        let blocks = Extractor::new(&document, &excluded, ExtractionHints::default(), "utf-8")
            .blocks(&[zones::body(&document)]);
        assert_eq!(blocks, vec![block("p", "Keep", vec![])]);
    }

    #[test]
    fn test_zone_root_that_is_a_block_is_emitted() {
        let document = Html::parse_document("<body><div id='main'>Lead <p>Para</p></div><p>Outside</p></body>");
        let root = document.select(&scraper::Selector::parse("#main").unwrap()).next().unwrap().id();
        let excluded = ExclusionSet::default();
        let blocks = Extractor::new(&document, &excluded, ExtractionHints::default(), "utf-8").blocks(&[root]);
        assert_eq!(blocks, vec![block("div", "Lead", vec![]), block("p", "Para", vec![])]);
    }
}
