//! Nodes that extraction must skip.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::node::Element;
use scraper::Html;
use tracing::instrument;

use crate::consts;
use crate::models::SelectorList;
use crate::zones;

/// Node handles matched by exclude selectors, plus all of their descendants.
///
/// Inline-hidden elements are deliberately not part of the set: hidden
/// content is filtered independently during the walk, whatever the selectors
/// said.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    nodes: HashSet<NodeId>,
}

impl ExclusionSet {
    /// Unions every CSS and XPath match. Unlike the main zone there is no
    /// first-match-wins: exclusion is maximally inclusive.
    #[instrument(skip_all, fields(excluded))]
    pub fn build(document: &Html, exclude: &SelectorList) -> (Self, Vec<String>) {
        let (selectors, mut warnings) = zones::compile(exclude);
        let mut nodes = HashSet::new();
        for selector in &selectors {
            let matched = selector.match_nodes(document);
            if matched.is_empty() {
                warnings.push(format!("Exclusion selector matched nothing: {}", selector.source()));
                continue;
            }
            for id in matched {
                if let Some(node) = document.tree.get(id) {
                    nodes.extend(node.descendants().map(|descendant| descendant.id()));
                }
            }
        }
        tracing::Span::current().record("excluded", nodes.len());
        (Self { nodes }, warnings)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Whether an inline style hides the element.
pub fn is_hidden(element: &Element) -> bool {
    element.attr("style").is_some_and(|style| consts::HIDDEN_STYLE_REGEX.is_match(style))
}
