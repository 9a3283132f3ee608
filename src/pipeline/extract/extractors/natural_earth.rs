use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::constants::{self, keys};
use crate::domain::Zone;
use crate::pipeline::extract::properties::as_integer;
use crate::pipeline::extract::{Extraction, Extractor, Feature, FixTable, PropertyResolver};
use crate::storage::ZoneStore;

/// Known Natural Earth defects, keyed by `NE_ID`
pub static NATURAL_EARTH_FIXES: Lazy<FixTable> = Lazy::new(|| {
    FixTable::new()
        // France is lacking ISO codes
        .with_fix("1159320637", "ISO_A2", "FR")
        .with_fix("1159320637", "ISO_A3", "FRA")
        // Norway is lacking ISO codes
        .with_fix("1159321109", "ISO_A2", "NO")
        .with_fix("1159321109", "ISO_A3", "NOR")
});

/// Extracts countries from Natural Earth admin-0 polygons.
///
/// See http://www.naturalearthdata.com/downloads/110m-cultural-vectors/110m-admin-0-countries/
/// The ISO 3166-1 alpha-2 code is the zone code.
pub struct NaturalEarthExtractor {
    resolver: PropertyResolver,
}

impl NaturalEarthExtractor {
    pub fn new() -> Self {
        // Fixed features may also lack the property outright (France without ISO_A3)
        Self::with_resolver(
            PropertyResolver::new(constants::NATURAL_EARTH_NONE, NATURAL_EARTH_FIXES.clone()).fixing_absent_keys(),
        )
    }

    pub fn with_resolver(resolver: PropertyResolver) -> Self {
        Self { resolver }
    }
}

impl Default for NaturalEarthExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for NaturalEarthExtractor {
    fn name(&self) -> &str {
        "Natural Earth countries"
    }

    async fn extract(&self, _store: &dyn ZoneStore, feature: &Feature) -> anyhow::Result<Extraction> {
        let name = feature.property("NAME").filter(|n| !n.trim().is_empty());
        let Some(code) = self.resolver.resolve(feature, "ISO_A2") else {
            return Ok(Extraction::Skipped(format!(
                "Missing iso code 2 for {}",
                name.as_deref().unwrap_or(&feature.id)
            )));
        };
        let Some(name) = name else {
            return Ok(Extraction::Skipped(format!("Missing name for country {}", code)));
        };

        let mut zone = Zone::new(constants::COUNTRY, &code, &name)
            .with_parent(constants::zone_id(constants::COUNTRY_GROUP, "world"))
            .with_key(keys::ISO2, Some(code.clone()))
            .with_key(keys::ISO3, self.resolver.resolve(feature, "ISO_A3"))
            .with_key(keys::UN, self.resolver.resolve(feature, "UN_A3"))
            .with_key(keys::FIPS, self.resolver.resolve(feature, "FIPS_10"));
        zone.population = self.resolver.resolve_with(feature, "POP_EST", as_integer);

        Ok(Extraction::Extracted(zone))
    }
}
