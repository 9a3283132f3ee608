use std::collections::HashMap;

use super::Extractor;
use crate::pipeline::source::SourceSpec;

/// An extractor bound to the source it reads
pub struct RegisteredExtractor {
    pub source: SourceSpec,
    pub extractor: Box<dyn Extractor>,
}

/// Ordered extractor chains per level
#[derive(Default)]
pub struct ExtractorRegistry {
    chains: HashMap<String, Vec<RegisteredExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extractor to a level's chain
    pub fn register(&mut self, level: &str, source: SourceSpec, extractor: Box<dyn Extractor>) {
        self.chains
            .entry(level.to_string())
            .or_default()
            .push(RegisteredExtractor { source, extractor });
    }

    /// A level's chain in registration order, empty for unknown levels
    pub fn chain(&self, level: &str) -> &[RegisteredExtractor] {
        self.chains.get(level).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// `(source url, extractor name)` pairs of a level
    pub fn describe(&self, level: &str) -> Vec<(&str, &str)> {
        self.chain(level)
            .iter()
            .map(|e| (e.source.url.as_str(), e.extractor.name()))
            .collect()
    }
}
