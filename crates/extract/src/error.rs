//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! The extraction core itself never fails on malformed input; these errors
//! exist for the analyzer boundary and for selector compilation, which the
//! zone resolver downgrades to warnings.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The structure analyzer could not produce metadata for the document.
    #[display("analysis failed: {message}")]
    AnalysisFailed {
        /// What went wrong.
        message: String,
        /// A hint for the caller on how to fix the input or retry.
        suggested_prompt: String,
    },
    /// A CSS selector could not be compiled.
    #[display("invalid CSS selector '{selector}': {reason}")]
    InvalidSelector {
        /// The selector as supplied.
        selector: String,
        /// Why compilation failed.
        reason: String,
    },
    /// An XPath expression uses syntax outside the supported subset.
    #[display("invalid XPath expression '{expression}': {reason}")]
    InvalidXPath {
        /// The expression as supplied.
        expression: String,
        /// Why parsing failed.
        reason: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Selector errors are a property of the input. Analysis failures may
        // succeed with a different prompt, but never with the same one.
        false
    }

    /// Convenience constructor for [`AnalysisFailed`](Self::AnalysisFailed).
    pub fn analysis_failed(message: impl Into<String>, suggested_prompt: impl Into<String>) -> Self {
        Self::AnalysisFailed {
            message: message.into(),
            suggested_prompt: suggested_prompt.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::analysis_failed("provider timed out", "retry later").to_string(),
            "analysis failed: provider timed out"
        );
        assert_eq!(
            ErrorKind::InvalidXPath {
                expression: "//div[".to_string(),
                reason: "unexpected end of expression".to_string(),
            }
            .to_string(),
            "invalid XPath expression '//div[': unexpected end of expression"
        );
    }

    #[test]
    fn nothing_is_retryable() {
        assert!(!ErrorKind::analysis_failed("x", "y").is_retryable());
        assert!(
            !ErrorKind::InvalidSelector {
                selector: "p[".to_string(),
                reason: "x".to_string()
            }
            .is_retryable()
        );
    }
}
