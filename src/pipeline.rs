//! One document from bytes to blocks: cache lookup, analysis on a miss,
//! then the deterministic extraction core.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use salvage_cache::{CacheEntry, DocumentKey, MetadataCache};
use salvage_extract::models::{ExtractionResult, Metadata};
use salvage_extract::{Analyzer, DEFAULT_ANALYSIS_BYTES, preprocess};
use tracing::instrument;

pub struct Pipeline<'a> {
    analyzer: &'a dyn Analyzer,
    cache: Option<&'a dyn MetadataCache>,
    /// Analyze even when the cache holds an entry, replacing it.
    refresh: bool,
    max_html_bytes: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(analyzer: &'a dyn Analyzer) -> Self {
        Self {
            analyzer,
            cache: None,
            refresh: false,
            max_html_bytes: DEFAULT_ANALYSIS_BYTES,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn MetadataCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn max_html_bytes(mut self, max_html_bytes: usize) -> Self {
        self.max_html_bytes = max_html_bytes;
        self
    }

    /// Extracts one document. Only a failed analysis is an error.
    #[instrument(skip_all, fields(size = bytes.len(), source = source_name, key))]
    pub fn run(&self, bytes: &[u8], source_name: Option<&str>) -> Result<ExtractionResult> {
        let key = DocumentKey::for_document(bytes, source_name).unwrap_or_else(|error| {
            tracing::warn!(?error, "unusable source name, keying by content");
            DocumentKey::from_html(bytes)
        });
        tracing::Span::current().record("key", key.as_str());

        let metadata = match self.cached(&key) {
            Some(metadata) => metadata,
            None => self.analyze(bytes, key, source_name)?,
        };
        Ok(salvage_extract::extract(bytes, &metadata))
    }

    fn cached(&self, key: &DocumentKey) -> Option<Metadata> {
        if self.refresh {
            return None;
        }
        self.cache?.get(key).map(|entry| entry.metadata)
    }

    fn analyze(&self, bytes: &[u8], key: DocumentKey, source_name: Option<&str>) -> Result<Metadata> {
        let preprocessed = preprocess(bytes);
        let input = preprocessed.analysis_input(self.max_html_bytes);
        let metadata = self.analyzer.analyze(&input).or_raise(|| ErrorKind::Analysis)?;

        if let Some(cache) = self.cache {
            let mut entry = CacheEntry::new(key, metadata.clone())
                .with_extra_info("declared_charset", preprocessed.declared_charset)
                .with_extra_info("anomalies", input.anomalies);
            if let Some(name) = source_name {
                entry = entry.with_source_name(name);
            }
            // A cache that cannot be written only costs a later re-analysis.
            if let Err(error) = cache.put(&entry) {
                tracing::warn!(?error, "could not cache metadata");
            }
        }
        Ok(metadata)
    }
}
