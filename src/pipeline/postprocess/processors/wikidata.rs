use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

use crate::constants::{self, keys};
use crate::pipeline::enrich::{country_fields, group_fields, merge_external, merge_rows, IdTranslation};
use crate::pipeline::postprocess::Postprocessor;
use crate::storage::{ZoneFilter, ZoneStore};
use crate::wiki::KnowledgeGraphClient;

/// Country groups by Wikidata id. `{ids}` receives the `wd:` values.
pub const COUNTRY_GROUPS_QUERY: &str = r#"
SELECT ?grp ?grpLabel ?population ?area ?geonames ?osm ?flag ?site ?wikipedia
WHERE
{
  VALUES ?grp { {ids} }
  ?grp wdt:P2046 ?area;
       wdt:P1082 ?population.
  OPTIONAL { ?grp wdt:P1566 ?geonames. }
  OPTIONAL { ?grp wdt:P41 ?flag. }
  OPTIONAL { ?grp wdt:P402 ?osm. }
  OPTIONAL { ?grp wdt:P856 ?site. }
  OPTIONAL { ?wikipedia schema:about ?grp;
                        schema:inLanguage 'en';
                        schema:isPartOf <https://en.wikipedia.org/>. }
  SERVICE wikibase:label { bd:serviceParam wikibase:language "en,fr". }
}
"#;

/// Sovereign states with a current ISO 3166-1 alpha-2 code
pub const COUNTRIES_QUERY: &str = r#"
SELECT DISTINCT ?country ?countryLabel ?population ?area ?iso2 ?iso3 ?geonames ?osm ?nuts ?fips ?flag ?site ?wikipedia
WHERE
{
  ?country wdt:P31 wd:Q3624078;
           wdt:P36 ?capital;
           wdt:P2046 ?area;
           wdt:P1082 ?population;
           p:P297 ?iso2Stmt.
  ?iso2Stmt ps:P297 ?iso2.
  FILTER NOT EXISTS { ?iso2Stmt pq:P582 [] } .
  OPTIONAL { ?country p:P298 ?iso3Stmt.
             ?iso3Stmt ps:P298 ?iso3.
             FILTER NOT EXISTS { ?iso3Stmt pq:P582 [] } . }
  OPTIONAL { ?country p:P605 ?nutsStmt.
             ?nutsStmt ps:P605 ?nuts.
             FILTER (regex(?nuts, '^\\w{2}$')) .
             FILTER NOT EXISTS { ?nutsStmt pq:P582 [] } . }
  OPTIONAL { ?country wdt:P901 ?fips. }
  OPTIONAL { ?country wdt:P1566 ?geonames. }
  OPTIONAL { ?country wdt:P41 ?flag. }
  OPTIONAL { ?country wdt:P402 ?osm. }
  OPTIONAL { ?country wdt:P856 ?site. }
  OPTIONAL { ?wikipedia schema:about ?country;
                        schema:inLanguage 'en';
                        schema:isPartOf <https://en.wikipedia.org/>. }
  SERVICE wikibase:label { bd:serviceParam wikibase:language "[AUTO_LANGUAGE],en,fr". }
}
"#;

/// Enriches current country groups carrying a Wikidata id
pub struct WikidataGroups {
    client: Arc<dyn KnowledgeGraphClient>,
}

impl WikidataGroups {
    pub fn new(client: Arc<dyn KnowledgeGraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Postprocessor for WikidataGroups {
    fn name(&self) -> &str {
        "Wikidata country groups"
    }

    async fn process(&self, store: &dyn ZoneStore, today: NaiveDate) -> anyhow::Result<u64> {
        info!("Fetching country-groups wikidata metadata");
        let filter = ZoneFilter::level(constants::COUNTRY_GROUP)
            .with_wikidata()
            .current_on(today);
        let groups = store.zones(&filter).await?;
        let ids = IdTranslation::from_wikidata(&groups);

        let summary = merge_external(
            store,
            self.client.as_ref(),
            &ids,
            COUNTRY_GROUPS_QUERY,
            "grp",
            group_fields,
        )
        .await?;
        info!(
            "Merged wikidata into {} country groups ({} unknown entities)",
            summary.merged, summary.dropped
        );
        Ok(summary.merged)
    }
}

/// Enriches countries, joining Wikidata rows on the ISO alpha-2 code
pub struct WikidataCountries {
    client: Arc<dyn KnowledgeGraphClient>,
}

impl WikidataCountries {
    pub fn new(client: Arc<dyn KnowledgeGraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Postprocessor for WikidataCountries {
    fn name(&self) -> &str {
        "Wikidata countries"
    }

    async fn process(&self, store: &dyn ZoneStore, _today: NaiveDate) -> anyhow::Result<u64> {
        info!("Fetching countries wikidata metadata");
        let countries = store.zones(&ZoneFilter::level(constants::COUNTRY)).await?;
        let ids = IdTranslation::from_key(&countries, keys::ISO2);
        if ids.is_empty() {
            info!("No country to enrich");
            return Ok(0);
        }

        let rows = self.client.query(COUNTRIES_QUERY).await?;
        let summary = merge_rows(
            store,
            rows,
            "country",
            &ids,
            |row| row.get("iso2").map(|iso2| iso2.to_lowercase()),
            country_fields,
        )
        .await;
        info!(
            "Merged wikidata into {} countries ({} rows without country)",
            summary.merged, summary.dropped
        );
        Ok(summary.merged)
    }
}
