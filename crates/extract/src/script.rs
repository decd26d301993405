//! Recovery of markup injected by inline scripts.
//!
//! Some pages write visible content with `document.write()`. Stripping
//! scripts would lose it, so the string literals handed to those calls are
//! recovered and run through the same tree-building and block extraction as
//! the page itself. Every resulting block is tagged `script:<tag>`.

use scraper::{ElementRef, Html};
use tracing::instrument;

use crate::consts;
use crate::exclusion::{ExclusionSet, is_hidden};
use crate::extract::Extractor;
use crate::models::{ContentBlock, ExtractionHints, SelectorList};
use crate::sanitize::sanitize;
use crate::zones;

/// Blocks recovered from script-injected fragments, plus warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptContent {
    pub blocks: Vec<ContentBlock>,
    pub warnings: Vec<String>,
}

/// The unescaped string literals passed to `document.write()` or
/// `document.writeln()` by inline scripts, in document order. Blank
/// fragments are dropped, as are scripts inside an excluded or inline-hidden
/// subtree, whose output would land where nobody sees it.
pub fn fragments(document: &Html, excluded: &ExclusionSet) -> Vec<String> {
    document
        .select(&consts::SCRIPT_SELECTOR)
        .filter(|script| script.value().attr("src").is_none())
        .filter(|script| !excluded.contains(script.id()) && !in_hidden_subtree(*script))
        .flat_map(|script| {
            let code = script.text().collect::<String>();
            consts::DOCUMENT_WRITE_REGEX
                .captures_iter(&code)
                .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
                .map(|literal| unescape(literal.as_str()))
                .collect::<Vec<_>>()
        })
        .filter(|fragment| !fragment.trim().is_empty())
        .collect()
}

fn in_hidden_subtree(script: ElementRef<'_>) -> bool {
    script
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_hidden(ancestor.value()))
}

/// Parses `html` only when it could contain a write call at all.
///
/// Fragments are taken from the decoded text rather than the sanitized one:
/// the idiomatic `"<\/p>"` escape would otherwise be mangled by the
/// stray-bracket repair. `exclude` is matched against this parse.
pub fn fragments_in(html: &str, exclude: &SelectorList) -> Vec<String> {
    if !html.contains("write") {
        return Vec::new();
    }
    let document = Html::parse_document(html);
    // Selector problems are reported once, against the sanitized tree.
    let (excluded, _) = ExclusionSet::build(&document, exclude);
    fragments(&document, &excluded)
}

/// Resolves the escapes that matter for markup inside a JS string literal.
/// Unknown escapes keep the escaped character.
fn unescape(literal: &str) -> String {
    let mut unescaped = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some(other) => unescaped.push(other),
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

/// Extracts blocks from each fragment, treating the whole fragment as the
/// main zone with nothing excluded.
#[instrument(skip_all, fields(fragments = fragments.len(), blocks))]
pub fn extract(fragments: &[String], hints: ExtractionHints, charset: &str) -> ScriptContent {
    let mut content = ScriptContent::default();
    let excluded = ExclusionSet::default();
    for fragment in fragments {
        let document = Html::parse_document(&sanitize(fragment).html);
        let blocks = Extractor::new(&document, &excluded, hints, charset).blocks(&[zones::body(&document)]);
        if blocks.is_empty() {
            tracing::debug!(size = fragment.len(), "script fragment yielded nothing");
            content.warnings.push("Script fragment produced no content blocks".to_string());
            continue;
        }
        content.blocks.extend(blocks.into_iter().map(ContentBlock::into_script_block));
    }
    tracing::Span::current().record("blocks", content.blocks.len());
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Link;
    use rstest::rstest;

    #[rstest]
    #[case(r#"<script>document.write("<p>Note</p>");</script>"#, vec!["<p>Note</p>"])]
    #[case(r#"<script>document.writeln('<p class=\'x\'>A</p>')</script>"#, vec!["<p class='x'>A</p>"])]
    #[case(
        r#"<script>document . write("<p>\"q\"<\/p>\n"); document.write('<b>2</b>');</script>"#,
        vec!["<p>\"q\"</p>\n", "<b>2</b>"]
    )]
    #[case(r#"<script>document.write("   ");</script>"#, vec![])]
    #[case(r#"<script src="x.js">document.write("<p>ignored</p>")</script>"#, vec![])]
    #[case(r#"<script>var html = "<p>not written</p>";</script>"#, vec![])]
    #[case(r#"<div style="display:none"><div><script>document.write("<p>x</p>")</script></div></div>"#, vec![])]
    fn test_fragments(#[case] html: &str, #[case] expected: Vec<&str>) {
        assert_eq!(fragments(&Html::parse_document(html), &ExclusionSet::default()), expected);
    }

    #[test]
    fn test_fragments_in_skips_excluded_scripts() {
        let html = r#"<div class="ad"><script>document.write("<p>Buy</p>")</script></div>
            <script>document.write("<p>Keep<\/p>")</script>"#;
        let exclude = SelectorList {
            css: vec![".ad".to_string()],
            xpath: vec![],
        };
        assert_eq!(fragments_in(html, &exclude), vec!["<p>Keep</p>"]);
        assert_eq!(fragments_in(html, &SelectorList::default()).len(), 2);
    }

    #[test]
    fn test_blocks_are_tagged() {
        let content = extract(
            &["<p>Note</p><a href=\"/x\">X</a>".to_string()],
            ExtractionHints::default(),
            "utf-8",
        );
        assert!(content.warnings.is_empty());
        assert_eq!(
            content.blocks,
            vec![
                ContentBlock {
                    tag: "script:p".to_string(),
                    text: "Note".to_string(),
                    raw: "Note".to_string(),
                    links: vec![],
                },
                ContentBlock {
                    tag: "script:a".to_string(),
                    text: String::new(),
                    raw: String::new(),
                    links: vec![Link {
                        href: "/x".to_string(),
                        text: "X".to_string(),
                        raw: "X".to_string(),
                    }],
                },
            ]
        );
    }

    #[test]
    fn test_empty_fragment_warns() {
        let content = extract(&["<img src=\"pixel.gif\">".to_string()], ExtractionHints::default(), "utf-8");
        assert!(content.blocks.is_empty());
        assert_eq!(content.warnings, vec!["Script fragment produced no content blocks"]);
    }
}
