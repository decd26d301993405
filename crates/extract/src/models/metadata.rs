use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::charset::DEFAULT_CHARSET;

/// Document structure as described by the analyzer.
///
/// Read-only to the extraction core. Missing fields deserialize to their
/// defaults so that hand-written metadata files can stay short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Charset the analyzer believes the document uses.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Selector-based regions of the document.
    #[serde(default)]
    pub content_zones: ContentZones,
    /// Flags that parameterize block extraction.
    #[serde(default)]
    pub extraction_hints: ExtractionHints,
    /// Structural problems the analyzer noticed, for information only.
    #[serde(default)]
    pub anomalies_detected: Vec<String>,
}

fn default_encoding() -> String {
    DEFAULT_CHARSET.to_string()
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            content_zones: ContentZones::default(),
            extraction_hints: ExtractionHints::default(),
            anomalies_detected: Vec::new(),
        }
    }
}

impl Metadata {
    /// Metadata whose main zone is the given CSS selectors, everything else default.
    pub fn with_main_css<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut metadata = Self::default();
        metadata.content_zones.main.css = selectors.into_iter().map(Into::into).collect();
        metadata
    }

    /// Normalizes a loosely-shaped analyzer response.
    ///
    /// Analyzers do not always honour the requested shape. A selector list
    /// given as a bare array is taken to be CSS, anything unrecognisable is an
    /// empty list, and an empty `main` zone falls back to the body element.
    /// `encoding` is used when the response does not name one.
    pub fn from_response(response: &Value, encoding: &str) -> Self {
        let zones = response.get("content_zones");
        let zone = |name: &str| SelectorList::from_value(zones.and_then(|zones| zones.get(name)));
        let mut main = zone("main");
        if main.is_empty() {
            main = SelectorList::body();
        }
        Self {
            encoding: response
                .get("encoding")
                .and_then(Value::as_str)
                .unwrap_or(encoding)
                .to_string(),
            content_zones: ContentZones {
                main,
                nav: zone("nav"),
                footer: zone("footer"),
                exclude: zone("exclude"),
            },
            extraction_hints: response
                .get("extraction_hints")
                .and_then(|hints| ExtractionHints::deserialize(hints).ok())
                .unwrap_or_default(),
            anomalies_detected: strings(response.get("anomalies_detected")),
        }
    }
}

/// The four named regions of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentZones {
    #[serde(default)]
    pub main: SelectorList,
    #[serde(default)]
    pub nav: SelectorList,
    #[serde(default)]
    pub footer: SelectorList,
    #[serde(default)]
    pub exclude: SelectorList,
}

/// Ordered CSS selectors and XPath expressions locating one zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorList {
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub xpath: Vec<String>,
}

impl SelectorList {
    pub fn is_empty(&self) -> bool {
        self.css.is_empty() && self.xpath.is_empty()
    }

    /// Selects the document body by either mechanism.
    pub fn body() -> Self {
        Self {
            css: vec!["body".to_string()],
            xpath: vec!["//body".to_string()],
        }
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Array(_)) => Self {
                css: strings(value),
                xpath: Vec::new(),
            },
            Some(Value::Object(map)) => Self {
                css: strings(map.get("css")),
                xpath: strings(map.get("xpath")),
            },
            _ => Self::default(),
        }
    }
}

/// Collects the string members of a JSON array, ignoring anything else.
fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Flags that parameterize block extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionHints {
    /// Collapse runs of whitespace in block and link text to one space.
    #[serde(default = "enabled")]
    pub collapse_whitespace: bool,
    /// Use `<img alt>` as text.
    #[serde(default = "enabled")]
    pub include_alt_text: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ExtractionHints {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            include_alt_text: true,
        }
    }
}
