//! Selector-driven zone resolution.

mod xpath;

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{Html, Selector};
use tracing::instrument;

pub use self::xpath::XPath;
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{ContentZones, SelectorList};

/// One way of locating nodes: a CSS selector or an XPath expression.
#[derive(Debug, Clone)]
pub enum ZoneSelector {
    Css { source: String, selector: Selector },
    XPath(XPath),
}

impl ZoneSelector {
    pub fn css(source: &str) -> Result<Self> {
        match Selector::parse(source) {
            Ok(selector) => Ok(Self::Css {
                source: source.to_string(),
                selector,
            }),
            Err(error) => exn::bail!(ErrorKind::InvalidSelector {
                selector: source.to_string(),
                reason: error.to_string(),
            }),
        }
    }

    pub fn xpath(source: &str) -> Result<Self> {
        Ok(Self::XPath(XPath::parse(source)?))
    }

    /// The selector as it was written.
    pub fn source(&self) -> &str {
        match self {
            Self::Css { source, .. } => source,
            Self::XPath(xpath) => xpath.source(),
        }
    }

    /// Every matching element, in document order.
    pub fn match_nodes(&self, document: &Html) -> Vec<NodeId> {
        match self {
            Self::Css { selector, .. } => document.select(selector).map(|element| element.id()).collect(),
            Self::XPath(xpath) => xpath.select(&document.tree),
        }
    }
}

/// Compiles a selector list, CSS first, each mechanism in its given order.
///
/// Selectors that fail to compile are dropped with a warning so that the
/// rest of the list still applies.
pub fn compile(list: &SelectorList) -> (Vec<ZoneSelector>, Vec<String>) {
    let mut selectors = Vec::with_capacity(list.css.len() + list.xpath.len());
    let mut warnings = Vec::new();
    let compiled = list
        .css
        .iter()
        .map(|css| ZoneSelector::css(css))
        .chain(list.xpath.iter().map(|xpath| ZoneSelector::xpath(xpath)));
    for result in compiled {
        match result {
            Ok(selector) => selectors.push(selector),
            Err(error) => {
                let reason = (*error).to_string();
                tracing::warn!(%reason, "skipping selector");
                warnings.push(format!("Skipped {reason}"));
            },
        }
    }
    (selectors, warnings)
}

/// The resolved regions of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zones {
    /// Roots of the main content. No root is a descendant of another.
    pub main: Vec<NodeId>,
    /// Informational only.
    pub nav: Vec<NodeId>,
    /// Informational only.
    pub footer: Vec<NodeId>,
    pub warnings: Vec<String>,
}

/// Resolves the main, nav and footer zones.
///
/// The first main selector that matches anything wins, CSS before XPath,
/// and all of its matches are used. With no match the body element is used
/// instead, which is a fallback and never an error.
#[instrument(skip_all, fields(main))]
pub fn resolve(document: &Html, zones: &ContentZones) -> Zones {
    let (main_selectors, mut warnings) = compile(&zones.main);
    let mut main = main_selectors
        .iter()
        .map(|selector| selector.match_nodes(document))
        .find(|nodes| !nodes.is_empty())
        .unwrap_or_default();
    if main.is_empty() {
        warnings.push("No main content found, using body".to_string());
        main.push(body(document));
    }
    let main = outermost(document, main);
    tracing::Span::current().record("main", main.len());

    let mut union = |list: &SelectorList| {
        let (selectors, compile_warnings) = compile(list);
        warnings.extend(compile_warnings);
        let mut seen = HashSet::new();
        selectors
            .iter()
            .flat_map(|selector| selector.match_nodes(document))
            .filter(|id| seen.insert(*id))
            .collect::<Vec<_>>()
    };
    let nav = union(&zones.nav);
    let footer = union(&zones.footer);
    Zones {
        main,
        nav,
        footer,
        warnings,
    }
}

/// The body element, or the root element for documents that somehow lack one.
pub(crate) fn body(document: &Html) -> NodeId {
    document
        .select(&consts::BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element())
        .id()
}

/// Drops every root that sits inside another root, keeping document order.
fn outermost(document: &Html, roots: Vec<NodeId>) -> Vec<NodeId> {
    let set: HashSet<NodeId> = roots.iter().copied().collect();
    let mut seen = HashSet::new();
    roots
        .into_iter()
        .filter(|id| seen.insert(*id))
        .filter(|id| {
            document
                .tree
                .get(*id)
                .is_some_and(|node| !node.ancestors().any(|ancestor| set.contains(&ancestor.id())))
        })
        .collect()
}
