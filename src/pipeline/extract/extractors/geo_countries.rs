use async_trait::async_trait;

use crate::constants::{self, keys};
use crate::pipeline::extract::{Extraction, Extractor, Feature};
use crate::storage::ZoneStore;

/// Reconciles the cleaner Datahub geo-countries shapes (https://datahub.io/core/geo-countries)
/// against countries already extracted, by ISO 3166-1 alpha-3 code. Never creates zones.
#[derive(Debug, Default)]
pub struct GeoCountriesExtractor;

impl GeoCountriesExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for GeoCountriesExtractor {
    fn name(&self) -> &str {
        "Datahub geo-countries"
    }

    async fn extract(&self, store: &dyn ZoneStore, feature: &Feature) -> anyhow::Result<Extraction> {
        let Some(iso3) = feature.property("ISO_A3").map(|c| c.to_lowercase()) else {
            return Ok(Extraction::Unmatched);
        };

        Ok(match store.find_by_key(constants::COUNTRY, keys::ISO3, &iso3).await? {
            Some(zone) => Extraction::Matched(zone),
            None => Extraction::Unmatched,
        })
    }
}
