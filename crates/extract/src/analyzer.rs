//! The boundary to the structure analyzer.
//!
//! Analysis is the only step of the pipeline that can fail. Whatever
//! produces the [`Metadata`] (a language model, a rules engine, a file on
//! disk) sits behind [`Analyzer`]; the extraction core only ever consumes the
//! result.

use serde::Serialize;

use crate::error::{ErrorKind, Result};
use crate::models::Metadata;

/// What an analyzer is shown about a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisInput {
    /// Normalized HTML, cut to the analysis budget.
    pub html: String,
    pub declared_charset: String,
    pub anomalies: Vec<String>,
}

/// Maps a document to selector-based content zones.
pub trait Analyzer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ErrorKind::AnalysisFailed`] when no metadata can be produced.
    fn analyze(&self, input: &AnalysisInput) -> Result<Metadata>;
}

/// Returns the same metadata for every document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAnalyzer {
    metadata: Metadata,
}

impl StaticAnalyzer {
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }
}

impl Analyzer for StaticAnalyzer {
    fn analyze(&self, input: &AnalysisInput) -> Result<Metadata> {
        tracing::debug!(size = input.html.len(), "using static metadata");
        let mut metadata = self.metadata.clone();
        if metadata.anomalies_detected.is_empty() {
            metadata.anomalies_detected = input.anomalies.clone();
        }
        Ok(metadata)
    }
}

/// An analyzer that is never available, for callers that only run with
/// pre-resolved metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unavailable;

impl Analyzer for Unavailable {
    fn analyze(&self, _input: &AnalysisInput) -> Result<Metadata> {
        exn::bail!(ErrorKind::analysis_failed(
            "no analyzer is configured",
            "Supply metadata for this document explicitly.",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AnalysisInput {
        AnalysisInput {
            html: "<p>x</p>".to_string(),
            declared_charset: "utf-8".to_string(),
            anomalies: vec!["double_angle_brackets".to_string()],
        }
    }

    #[test]
    fn test_static_analyzer_fills_anomalies() {
        let metadata = StaticAnalyzer::new(Metadata::with_main_css(["article"])).analyze(&input()).unwrap();
        assert_eq!(metadata.content_zones.main.css, vec!["article"]);
        assert_eq!(metadata.anomalies_detected, vec!["double_angle_brackets"]);
    }

    #[test]
    fn test_unavailable_analyzer_fails() {
        let error = Unavailable.analyze(&input()).unwrap_err();
        assert!(matches!(&*error, ErrorKind::AnalysisFailed { .. }));
        assert!(!error.is_retryable());
    }
}
