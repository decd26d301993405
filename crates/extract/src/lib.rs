pub mod analyzer;
pub mod charset;
mod consts;
mod correct;
pub mod error;
pub mod exclusion;
mod extract;
pub mod models;
pub mod preprocess;
pub mod sanitize;
pub mod script;
mod truncate;
pub mod zones;

use scraper::Html;
use tracing::instrument;

pub use crate::analyzer::{AnalysisInput, Analyzer, StaticAnalyzer};
pub use crate::correct::correct;
pub use crate::exclusion::ExclusionSet;
pub use crate::extract::Extractor;
use crate::models::{ExtractionResult, Metadata};
pub use crate::preprocess::{Preprocessed, preprocess};
pub use crate::truncate::{DEFAULT_ANALYSIS_BYTES, TRUNCATION_MARKER, truncate_for_analysis};

/// Easy, top-level entrypoint for extracting content blocks from raw bytes.
///
/// Resolves the charset, then runs [`extract_html`]. Never fails: whatever
/// could not be repaired is reported in [`ExtractionResult::warnings`], in
/// pipeline order.
#[instrument(skip_all, fields(size = bytes.as_ref().len()))]
pub fn extract(bytes: impl AsRef<[u8]>, metadata: &Metadata) -> ExtractionResult {
    let decoded = charset::resolve(bytes.as_ref());
    let mut result = extract_html(&decoded.text, metadata, &decoded.charset);
    let mut warnings = decoded.warnings;
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    result
}

/// Extracts content blocks from already-decoded text.
///
/// `charset` is the charset the text was decoded with; it drives the
/// encoding correction of every extracted `text` field.
#[instrument(skip_all, fields(size = html.len(), charset, blocks, warnings))]
pub fn extract_html(html: &str, metadata: &Metadata, charset: &str) -> ExtractionResult {
    let hints = metadata.extraction_hints;
    let sanitized = sanitize::sanitize(html);
    let mut warnings = sanitized.warnings;
    let document = Html::parse_document(&sanitized.html);

    let zones = zones::resolve(&document, &metadata.content_zones);
    warnings.extend(zones.warnings);
    let (excluded, exclusion_warnings) = ExclusionSet::build(&document, &metadata.content_zones.exclude);
    warnings.extend(exclusion_warnings);
    let mut blocks = Extractor::new(&document, &excluded, hints, charset).blocks(&zones.main);

    let scripts = script::extract(&script::fragments_in(html, &metadata.content_zones.exclude), hints, charset);
    blocks.extend(scripts.blocks);
    warnings.extend(scripts.warnings);

    let span = tracing::Span::current();
    span.record("charset", charset);
    span.record("blocks", blocks.len());
    span.record("warnings", warnings.len());
    ExtractionResult { blocks, warnings }
}
