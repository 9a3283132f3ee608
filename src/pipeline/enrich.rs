use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::constants::keys;
use crate::domain::Zone;
use crate::error::Result;
use crate::observability::metrics::{emit_counter, MetricName};
use crate::pipeline::merge::apply_non_null_fields;
use crate::storage::{ZoneField, ZoneFilter, ZoneStore, ZoneUpdate};
use crate::wiki::{
    self, media_url_to_path, parse_count, parse_measure, uri_to_id, wikipedia_to_dbpedia, wikipedia_url_to_id,
    KnowledgeGraphClient, Row,
};

/// Two letters country level NUTS codes only
static NUTS_COUNTRY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w{2}$").expect("valid NUTS regex"));

/// Bidirectional table between internal zone ids and external identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdTranslation {
    to_external: BTreeMap<String, String>,
    to_internal: BTreeMap<String, String>,
}

impl IdTranslation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zones carrying a Wikidata id
    pub fn from_wikidata(zones: &[Zone]) -> Self {
        let mut ids = Self::new();
        for zone in zones {
            if let Some(wikidata) = &zone.wikidata {
                ids.insert(&zone.id, wikidata);
            }
        }
        ids
    }

    /// Zones carrying the `scheme` key
    pub fn from_key(zones: &[Zone], scheme: &str) -> Self {
        let mut ids = Self::new();
        for zone in zones {
            if let Some(value) = zone.key(scheme) {
                ids.insert(&zone.id, value);
            }
        }
        ids
    }

    pub fn insert(&mut self, internal: &str, external: &str) {
        self.to_external.insert(internal.to_string(), external.to_string());
        self.to_internal.insert(external.to_string(), internal.to_string());
    }

    pub fn internal(&self, external: &str) -> Option<&str> {
        self.to_internal.get(external).map(|s| s.as_str())
    }

    pub fn external(&self, internal: &str) -> Option<&str> {
        self.to_external.get(internal).map(|s| s.as_str())
    }

    pub fn external_ids(&self) -> impl Iterator<Item = &str> {
        self.to_internal.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.to_internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_internal.is_empty()
    }
}

/// Substitute `{ids}` with the whole identifier set as `wd:` values
pub fn render_query(template: &str, ids: &IdTranslation) -> String {
    let values = ids.external_ids().map(|id| format!("wd:{}", id)).collect::<Vec<_>>().join(" ");
    template.replace("{ids}", &values)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Entities after reduction
    pub rows: usize,
    /// Zones actually modified
    pub merged: u64,
    /// Rows with no matching zone
    pub dropped: usize,
    pub failed: usize,
}

/// Reduce rows by `column`, join each to a zone and merge its fields.
///
/// `external_id` reads the join value out of a reduced row; rows whose value
/// is unknown to `ids` are dropped. A failing write is logged and skipped.
pub async fn merge_rows(
    store: &dyn ZoneStore,
    rows: Vec<Row>,
    column: &str,
    ids: &IdTranslation,
    external_id: impl Fn(&Row) -> Option<String>,
    fields: impl Fn(&Row) -> ZoneUpdate,
) -> MergeSummary {
    let rows = wiki::reduce_rows(rows, column);
    let mut summary = MergeSummary {
        rows: rows.len(),
        ..MergeSummary::default()
    };

    for row in &rows {
        let Some(zone_id) = external_id(row).and_then(|ext| ids.internal(&ext).map(str::to_string)) else {
            debug!("No zone for {:?}", row.get(column));
            summary.dropped += 1;
            emit_counter(MetricName::KnowledgeGraphRowsDropped, 1);
            continue;
        };

        match apply_non_null_fields(store, &ZoneFilter::id(&zone_id), &fields(row)).await {
            Ok(modified) => summary.merged += modified,
            Err(e) => {
                warn!("Unable to merge external data into {}: {}", zone_id, e);
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Batched knowledge-graph enrichment of zones identified by their Wikidata id.
///
/// One query is issued for the whole identifier set, its rows are reduced by
/// `column` (the entity URI), translated back to zone ids and merged field by
/// field, absent values leaving stored ones in place.
pub async fn merge_external(
    store: &dyn ZoneStore,
    client: &dyn KnowledgeGraphClient,
    ids: &IdTranslation,
    query_template: &str,
    column: &str,
    fields: impl Fn(&Row) -> ZoneUpdate,
) -> Result<MergeSummary> {
    if ids.is_empty() {
        info!("No zone carries a Wikidata id, nothing to fetch");
        return Ok(MergeSummary::default());
    }

    let rows = client.query(&render_query(query_template, ids)).await?;
    let summary = merge_rows(
        store,
        rows,
        column,
        ids,
        |row| row.get(column).and_then(|uri| uri_to_id(uri)),
        fields,
    )
    .await;
    Ok(summary)
}

fn lowercase(value: Option<&String>) -> Option<String> {
    value.map(|v| v.to_lowercase())
}

/// Fields shared by every entity: identifiers, links and measures
fn common_fields(row: &Row, entity_column: &str) -> ZoneUpdate {
    let wikipedia = row.get("wikipedia").map(|s| s.as_str());
    ZoneUpdate::new()
        .set(ZoneField::Wikidata, row.get(entity_column).and_then(|uri| uri_to_id(uri)))
        .set(ZoneField::Wikipedia, wikipedia_url_to_id(wikipedia))
        .set(ZoneField::Dbpedia, wikipedia_to_dbpedia(wikipedia))
        .set(ZoneField::Website, row.get("site").cloned())
        .set(ZoneField::Flag, media_url_to_path(row.get("flag").map(|s| s.as_str())))
        .set(ZoneField::Area, parse_measure(row.get("area").map(|s| s.as_str())))
        .set(ZoneField::Population, parse_count(row.get("population").map(|s| s.as_str())))
        .set(ZoneField::key(keys::OSM), row.get("osm").cloned())
        .set(ZoneField::key(keys::GEONAMES), row.get("geonames").cloned())
}

/// Zone update for a country group row (`?grp` entity column)
pub fn group_fields(row: &Row) -> ZoneUpdate {
    common_fields(row, "grp")
}

/// Zone update for a country row (`?country` entity column)
pub fn country_fields(row: &Row) -> ZoneUpdate {
    let nuts = lowercase(row.get("nuts")).filter(|n| NUTS_COUNTRY_CODE.is_match(n));
    common_fields(row, "country")
        .set(ZoneField::key(keys::ISO3), lowercase(row.get("iso3")))
        .set(ZoneField::key(keys::NUTS), nuts)
        .set(ZoneField::key(keys::FIPS), lowercase(row.get("fips")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeozonesError;
    use crate::storage::{FieldValue, InMemoryZoneStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// Returns canned rows and records the queries it receives
    struct CannedClient {
        rows: Vec<Row>,
        queries: Mutex<Vec<String>>,
    }

    impl CannedClient {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl KnowledgeGraphClient for CannedClient {
        async fn query(&self, query: &str) -> Result<Vec<Row>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.rows.clone())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl KnowledgeGraphClient for FailingClient {
        async fn query(&self, _query: &str) -> Result<Vec<Row>> {
            Err(GeozonesError::KnowledgeGraph {
                message: "endpoint down".to_string(),
            })
        }
    }

    async fn store_with_groups() -> (InMemoryZoneStore, IdTranslation) {
        let store = InMemoryZoneStore::new();
        let mut ue = Zone::new("country-group", "ue", "European Union");
        ue.wikidata = Some("Q458".into());
        ue.population = Some(446_000_000);
        ue.area = Some(4_233_262.0);
        let mut world = Zone::new("country-group", "world", "World");
        world.wikidata = Some("Q2".into());
        store.save_zone(ue).await.unwrap();
        store.save_zone(world).await.unwrap();
        store.save_zone(Zone::new("country-group", "other", "No wikidata")).await.unwrap();

        let zones = store.zones(&ZoneFilter::level("country-group").with_wikidata()).await.unwrap();
        (store, IdTranslation::from_wikidata(&zones))
    }

    #[test]
    fn test_translation_is_bidirectional() {
        let mut ids = IdTranslation::new();
        ids.insert("country-group:ue", "Q458");
        assert_eq!(ids.internal("Q458"), Some("country-group:ue"));
        assert_eq!(ids.external("country-group:ue"), Some("Q458"));
        assert_eq!(ids.internal("Q2"), None);
    }

    #[test]
    fn test_query_is_batched() {
        let mut ids = IdTranslation::new();
        ids.insert("country-group:world", "Q2");
        ids.insert("country-group:ue", "Q458");
        assert_eq!(render_query("VALUES ?grp { {ids} }", &ids), "VALUES ?grp { wd:Q2 wd:Q458 }");
    }

    #[tokio::test]
    async fn test_one_query_for_every_group() {
        let (store, ids) = store_with_groups().await;
        assert_eq!(ids.len(), 2);
        let client = CannedClient::new(vec![]);

        merge_external(&store, &client, &ids, "VALUES ?grp { {ids} }", "grp", group_fields)
            .await
            .unwrap();

        let queries = client.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("wd:Q2") && queries[0].contains("wd:Q458"));
    }

    #[tokio::test]
    async fn test_zero_and_absent_quantities_keep_stored_values() {
        let (store, ids) = store_with_groups().await;
        let client = CannedClient::new(vec![row(&[
            ("grp", "http://www.wikidata.org/entity/Q458"),
            ("population", "0"),
        ])]);

        let summary = merge_external(&store, &client, &ids, "{ids}", "grp", group_fields)
            .await
            .unwrap();
        assert_eq!(summary.rows, 1);

        let ue = store.get_zone("country-group:ue").await.unwrap().unwrap();
        assert_eq!(ue.population, Some(446_000_000));
        assert_eq!(ue.area, Some(4_233_262.0));
    }

    #[tokio::test]
    async fn test_multi_row_entities_are_merged_and_strangers_dropped() {
        let (store, ids) = store_with_groups().await;
        let client = CannedClient::new(vec![
            row(&[
                ("grp", "http://www.wikidata.org/entity/Q458"),
                ("population", "447706209"),
                ("osm", "2559126"),
            ]),
            row(&[
                ("grp", "http://www.wikidata.org/entity/Q458"),
                ("wikipedia", "https://en.wikipedia.org/wiki/European_Union"),
                ("flag", "http://commons.wikimedia.org/wiki/Special:FilePath/Flag%20of%20Europe.svg"),
            ]),
            row(&[("grp", "http://www.wikidata.org/entity/Q46"), ("population", "750000000")]),
        ]);

        let summary = merge_external(&store, &client, &ids, "{ids}", "grp", group_fields)
            .await
            .unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.dropped, 1);

        let ue = store.get_zone("country-group:ue").await.unwrap().unwrap();
        assert_eq!(ue.population, Some(447_706_209));
        assert_eq!(ue.key("osm"), Some("2559126"));
        assert_eq!(ue.wikipedia.as_deref(), Some("en:European_Union"));
        assert_eq!(ue.dbpedia.as_deref(), Some("http://dbpedia.org/resource/European_Union"));
        assert_eq!(ue.flag.as_deref(), Some("Flag_of_Europe.svg"));
    }

    #[tokio::test]
    async fn test_no_ids_means_no_query() {
        let store = InMemoryZoneStore::new();
        let summary = merge_external(&store, &FailingClient, &IdTranslation::new(), "{ids}", "grp", group_fields)
            .await
            .unwrap();
        assert_eq!(summary, MergeSummary::default());
    }

    #[tokio::test]
    async fn test_query_failure_is_reported() {
        let (store, ids) = store_with_groups().await;
        let result = merge_external(&store, &FailingClient, &ids, "{ids}", "grp", group_fields).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_country_fields_filter_keys() {
        let update = country_fields(&row(&[
            ("country", "http://www.wikidata.org/entity/Q142"),
            ("iso3", "FRA"),
            ("nuts", "FR1"),
            ("fips", "FR"),
            ("area", "not a number"),
            ("population", "68373433"),
        ]));

        assert_eq!(update.get(&ZoneField::Wikidata), Some(&FieldValue::from("Q142")));
        assert_eq!(update.get(&ZoneField::key("iso3")), Some(&FieldValue::from("fra")));
        assert_eq!(update.get(&ZoneField::key("fips")), Some(&FieldValue::from("fr")));
        assert_eq!(update.get(&ZoneField::key("nuts")), None);
        assert_eq!(update.get(&ZoneField::Area), None);
        assert_eq!(update.get(&ZoneField::Population), Some(&FieldValue::Integer(68_373_433)));
    }
}
