use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub mod extractors;
pub mod properties;
pub mod registry;

pub use crate::pipeline::source::{Feature, Properties};
pub use properties::{FixTable, KeyPrecedence, PropertyResolver};
pub use registry::{ExtractorRegistry, RegisteredExtractor};

use crate::domain::{ChangeType, Zone};
use crate::observability::metrics::{emit_counter_for, MetricName};
use crate::pipeline::source::GeodataSource;
use crate::storage::ZoneStore;

/// Result of running one extractor on one feature
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A new canonical record
    Extracted(Zone),
    /// An existing record found by alternate key, possibly completed
    Matched(Zone),
    /// The feature fails a mandatory check. Logged as a warning.
    Skipped(String),
    /// Lookup-only extractor found nothing. Dropped silently.
    Unmatched,
}

/// Source-specific transform from a feature to a canonical zone
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human readable name used in logs
    fn name(&self) -> &str;

    async fn extract(&self, store: &dyn ZoneStore, feature: &Feature) -> anyhow::Result<Extraction>;
}

/// Counters for one level's extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub unmatched: usize,
    pub failed: usize,
    pub sources_failed: usize,
}

impl ExtractionSummary {
    fn record(&mut self, change: ChangeType) {
        match change {
            ChangeType::Created => self.created += 1,
            ChangeType::Updated => self.updated += 1,
            ChangeType::NoChange => self.unchanged += 1,
        }
    }
}

/// Run a level's extractor chain in registration order.
///
/// Nothing here aborts the chain: an unreadable source, a failing feature or
/// a failing save is logged and the next item is processed.
pub async fn run_level(
    registry: &ExtractorRegistry,
    level: &str,
    store: &dyn ZoneStore,
    geodata: &dyn GeodataSource,
) -> ExtractionSummary {
    let mut summary = ExtractionSummary::default();

    for entry in registry.chain(level) {
        let features = match geodata.features(&entry.source).await {
            Ok(features) => features,
            Err(e) => {
                error!("Unable to load {}: {}", entry.source.url, e);
                summary.sources_failed += 1;
                continue;
            }
        };
        info!(
            "Running {} on {} features from {}",
            entry.extractor.name(),
            features.len(),
            entry.source.url
        );

        for feature in &features {
            let extraction = match entry.extractor.extract(store, feature).await {
                Ok(extraction) => extraction,
                Err(e) => {
                    warn!("Feature {} failed: {:#}", feature.id, e);
                    summary.failed += 1;
                    emit_counter_for(MetricName::FeaturesFailed, level, 1);
                    continue;
                }
            };

            let zone = match extraction {
                Extraction::Extracted(zone) => {
                    emit_counter_for(MetricName::FeaturesExtracted, level, 1);
                    zone
                }
                Extraction::Matched(zone) => {
                    emit_counter_for(MetricName::FeaturesMatched, level, 1);
                    zone
                }
                Extraction::Skipped(reason) => {
                    warn!("{}, skipping", reason);
                    summary.skipped += 1;
                    emit_counter_for(MetricName::FeaturesSkipped, level, 1);
                    continue;
                }
                Extraction::Unmatched => {
                    debug!("No zone matches feature {}", feature.id);
                    summary.unmatched += 1;
                    emit_counter_for(MetricName::FeaturesUnmatched, level, 1);
                    continue;
                }
            };

            match store.save_zone(zone).await {
                Ok(change) => summary.record(change),
                Err(e) => {
                    warn!("Unable to save zone from feature {}: {}", feature.id, e);
                    summary.failed += 1;
                }
            }
        }
    }

    info!(
        "Extracted {}: {} created, {} updated, {} skipped, {} failed",
        level, summary.created, summary.updated, summary.skipped, summary.failed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{SourceSpec, StaticSource};
    use crate::storage::InMemoryZoneStore;
    use serde_json::json;

    /// Creates a zone from `CODE`, skips features without it, fails on `BOOM`
    struct CodeExtractor;

    #[async_trait]
    impl Extractor for CodeExtractor {
        fn name(&self) -> &str {
            "code"
        }

        async fn extract(&self, _store: &dyn ZoneStore, feature: &Feature) -> anyhow::Result<Extraction> {
            if feature.properties.contains_key("BOOM") {
                anyhow::bail!("corrupted feature");
            }
            Ok(match feature.property("CODE") {
                Some(code) => Extraction::Extracted(Zone::new("country", &code, &code)),
                None => Extraction::Skipped(format!("Missing code for {}", feature.id)),
            })
        }
    }

    /// Finds the zone named by `CODE`, never creates
    struct LookupExtractor;

    #[async_trait]
    impl Extractor for LookupExtractor {
        fn name(&self) -> &str {
            "lookup"
        }

        async fn extract(&self, store: &dyn ZoneStore, feature: &Feature) -> anyhow::Result<Extraction> {
            let code = feature.property("CODE").unwrap_or_default();
            Ok(match store.get_zone(&format!("country:{}", code)).await? {
                Some(zone) => Extraction::Matched(zone),
                None => Extraction::Unmatched,
            })
        }
    }

    fn feature(id: &str, properties: serde_json::Value) -> Feature {
        Feature::new(id, properties.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_chain_tolerates_bad_features_and_sources() {
        let mut registry = ExtractorRegistry::new();
        registry.register("country", SourceSpec::new("first"), Box::new(CodeExtractor));
        registry.register("country", SourceSpec::new("missing"), Box::new(CodeExtractor));
        registry.register("country", SourceSpec::new("second"), Box::new(LookupExtractor));

        let geodata = StaticSource::new()
            .with_features(
                "first",
                vec![
                    feature("1", json!({"CODE": "fr"})),
                    feature("2", json!({"NAME": "Nowhere"})),
                    feature("3", json!({"CODE": "de", "BOOM": true})),
                    feature("4", json!({"CODE": "it"})),
                ],
            )
            .with_features(
                "second",
                vec![feature("a", json!({"CODE": "fr"})), feature("b", json!({"CODE": "es"}))],
            );

        let store = InMemoryZoneStore::new();
        let summary = run_level(&registry, "country", &store, &geodata).await;

        assert_eq!(summary.created, 2);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.sources_failed, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_level_runs_nothing() {
        let registry = ExtractorRegistry::new();
        let store = InMemoryZoneStore::new();
        let summary = run_level(&registry, "country", &store, &StaticSource::new()).await;
        assert_eq!(summary, ExtractionSummary::default());
    }
}
