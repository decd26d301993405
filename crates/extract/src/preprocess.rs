//! Preparation of a document for the structure analyzer.
//!
//! The analyzer reads structure, not content, so it is shown the sanitized
//! document with comments removed and script, style and noscript bodies
//! cleared. The empty elements stay as structural hints.

use std::collections::HashMap;

use scraper::{Html, Node};
use serde::Serialize;
use tracing::instrument;

use crate::analyzer::AnalysisInput;
use crate::charset;
use crate::consts;
use crate::models::SelectorList;
use crate::sanitize::sanitize;
use crate::script;
use crate::truncate::truncate_for_analysis;

/// Every representation of a document the later stages may need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preprocessed {
    /// Charset the bytes were decoded with.
    pub declared_charset: String,
    /// Decoded text after string-level repairs, before tree construction.
    pub sanitized_html: String,
    /// What the analyzer is shown.
    pub normalized_html: String,
    /// Markup recovered from `document.write()` calls.
    pub script_fragments: Vec<String>,
    /// Structural oddities of the undecorated input.
    pub anomalies: Vec<String>,
    pub warnings: Vec<String>,
}

impl Preprocessed {
    /// Builds the analyzer request, cutting the normalized HTML to budget.
    pub fn analysis_input(&self, max_bytes: usize) -> AnalysisInput {
        AnalysisInput {
            html: truncate_for_analysis(&self.normalized_html, max_bytes).into_owned(),
            declared_charset: self.declared_charset.clone(),
            anomalies: self.anomalies.clone(),
        }
    }
}

#[instrument(skip(bytes), fields(size = bytes.len()))]
pub fn preprocess(bytes: &[u8]) -> Preprocessed {
    let decoded = charset::resolve(bytes);
    let mut warnings = decoded.warnings;
    let anomalies = anomalies(&decoded.text);
    let script_fragments = script::fragments_in(&decoded.text, &SelectorList::default());

    let sanitized = sanitize(&decoded.text);
    warnings.extend(sanitized.warnings);
    let mut document = Html::parse_document(&sanitized.html);
    let cleared = normalize(&mut document);
    if cleared.scripts > 0 {
        warnings.push(format!("Removed content from {} script tags", cleared.scripts));
    }
    if cleared.styles > 0 {
        warnings.push(format!("Removed content from {} style tags", cleared.styles));
    }
    tracing::debug!(
        comments = cleared.comments,
        anomalies = anomalies.len(),
        fragments = script_fragments.len(),
        "preprocessed document"
    );
    Preprocessed {
        declared_charset: decoded.charset,
        sanitized_html: sanitized.html,
        normalized_html: document.html(),
        script_fragments,
        anomalies,
        warnings,
    }
}

#[derive(Debug, Default)]
struct Cleared {
    comments: usize,
    scripts: usize,
    styles: usize,
}

/// Removes comments and empties script, style and noscript elements.
fn normalize(document: &mut Html) -> Cleared {
    let mut cleared = Cleared::default();
    let mut detach = Vec::new();
    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Comment(_) => {
                cleared.comments += 1;
                detach.push(node.id());
            },
            Node::Element(element) if matches!(element.name(), "script" | "style" | "noscript") => {
                match element.name() {
                    "script" => cleared.scripts += 1,
                    "style" => cleared.styles += 1,
                    _ => {},
                }
                detach.extend(node.children().map(|child| child.id()));
            },
            _ => {},
        }
    }
    for id in detach {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    cleared
}

/// Heuristic checks for malformed structure in the raw decoded text.
pub fn anomalies(html: &str) -> Vec<String> {
    let mut anomalies = Vec::new();
    let lower = html.to_ascii_lowercase();
    let opened = count_names(&consts::START_TAG_REGEX, &lower);
    let closed = count_names(&consts::CLOSE_TAG_REGEX, &lower);

    if html.contains("<<") {
        anomalies.push("double_angle_brackets".to_string());
    }
    let opened_non_void: usize = opened
        .iter()
        .filter(|(name, _)| !consts::VOID_TAGS.contains(&name.as_str()))
        .map(|(_, count)| count)
        .sum();
    if opened_non_void != closed.values().sum::<usize>() {
        anomalies.push("possible_unclosed_tags".to_string());
    }
    for tag in consts::ORPHAN_CHECK_TAGS {
        let closing = closed.get(*tag).copied().unwrap_or(0);
        if closing > opened.get(*tag).copied().unwrap_or(0) {
            anomalies.push(format!("orphan_closing_{tag}"));
        }
    }
    if lower.contains("href==") {
        anomalies.push("malformed_href_attribute".to_string());
    }
    if html.contains("HREF=") || html.contains("SRC=") {
        anomalies.push("uppercase_attributes".to_string());
    }
    if consts::EVENT_HANDLERS.iter().any(|handler| lower.contains(handler)) {
        anomalies.push("has_event_handlers".to_string());
    }
    anomalies
}

fn count_names(regex: &regex::Regex, html: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for captures in regex.captures_iter(html) {
        *counts.entry(captures[1].to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_preprocess() {
        let mut html = br#"<html><head><meta charset="iso-8859-1"><style>p { color: red }</style></head>
            <body><!-- tracking --><<p>>Caf"#
            .to_vec();
        html.push(0xe9);
        html.extend_from_slice(
            br#"</p>
            <script>document.write("<p>Note<\/p>");</script>
            <noscript><p>Enable JS</p></noscript></body></html>"#,
        );
        let preprocessed = preprocess(&html);
        assert_eq!(preprocessed.declared_charset, "windows-1252");
        assert!(preprocessed.sanitized_html.contains("<p>Café</p>"));
        assert!(!preprocessed.normalized_html.contains("tracking"));
        assert!(!preprocessed.normalized_html.contains("color: red"));
        assert!(!preprocessed.normalized_html.contains("document.write"));
        assert!(!preprocessed.normalized_html.contains("Enable JS"));
        assert!(preprocessed.normalized_html.contains("<script></script>"));
        assert_eq!(preprocessed.script_fragments, vec!["<p>Note</p>"]);
        assert!(preprocessed.anomalies.contains(&"double_angle_brackets".to_string()));
        assert_eq!(
            preprocessed.warnings,
            vec![
                "Fixed double angle brackets",
                "Escaped stray angle brackets",
                "Removed content from 1 script tags",
                "Removed content from 1 style tags",
            ]
        );
    }

    #[rstest]
    #[case("<p>fine</p>", vec![])]
    #[case("<<p>>x</p>", vec!["double_angle_brackets"])]
    #[case("<div><p>open", vec!["possible_unclosed_tags"])]
    #[case("<p>x</p></span>", vec!["possible_unclosed_tags", "orphan_closing_span"])]
    #[case("<p>a<br>b<img src=x></p>", vec![])]
    #[case(r#"<a href=="/x">x</a>"#, vec!["malformed_href_attribute"])]
    #[case(r#"<a HREF="/x">x</a>"#, vec!["uppercase_attributes"])]
    #[case(r#"<p onclick="go()">x</p>"#, vec!["has_event_handlers"])]
    fn test_anomalies(#[case] html: &str, #[case] expected: Vec<&str>) {
        assert_eq!(anomalies(html), expected);
    }

    #[test]
    fn test_analysis_input_is_truncated() {
        let preprocessed = preprocess(b"<p>0123456789</p><p>0123456789</p>");
        let input = preprocessed.analysis_input(40);
        assert!(input.html.ends_with("<!-- TRUNCATED -->"));
        assert!(input.html.len() <= 40 + "<!-- TRUNCATED -->".len());
        assert_eq!(input.declared_charset, "utf-8");
    }
}
