use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

use geozones::catalog;
use geozones::config::Config;
use geozones::domain::{self, Zone};
use geozones::error::{GeozonesError, Result};
use geozones::pipeline::extract::Feature;
use geozones::pipeline::source::StaticSource;
use geozones::pipeline::Builder;
use geozones::storage::{InMemoryZoneStore, ZoneFilter, ZoneStore};
use geozones::wiki::{KnowledgeGraphClient, Row};

const NATURAL_EARTH: &str = "memory://natural-earth";
const GEO_COUNTRIES: &str = "memory://geo-countries";

fn config() -> Config {
    let mut config = Config::default();
    config.sources.natural_earth = NATURAL_EARTH.to_string();
    config.sources.geo_countries = GEO_COUNTRIES.to_string();
    config
}

fn feature(id: &str, properties: Value) -> Feature {
    Feature::new(id, properties.as_object().cloned().unwrap_or_default())
}

fn natural_earth_features() -> Vec<Feature> {
    vec![
        feature(
            "1159320637",
            json!({"NAME": "France", "ISO_A2": "-99", "ISO_A3": "-99", "UN_A3": "250", "POP_EST": "-99"}),
        ),
        feature(
            "1159320517",
            json!({"NAME": "Germany", "ISO_A2": "DE", "ISO_A3": "DEU", "UN_A3": "276", "POP_EST": 80594017}),
        ),
        feature(
            "1159320379",
            json!({"NAME": "United States of America", "ISO_A2": "US", "ISO_A3": "USA", "POP_EST": 326625791}),
        ),
        feature("1159321403", json!({"NAME": "N. Cyprus", "ISO_A2": "-99", "ISO_A3": "-99"})),
    ]
}

fn geo_countries_features() -> Vec<Feature> {
    vec![
        feature("0", json!({"ADMIN": "France", "ISO_A3": "FRA"})),
        feature("1", json!({"ADMIN": "Antarctica", "ISO_A3": "ATA"})),
    ]
}

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Answers group queries and country queries with canned rows
struct FakeWikidata {
    queries: Mutex<Vec<String>>,
}

impl FakeWikidata {
    fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl KnowledgeGraphClient for FakeWikidata {
    async fn query(&self, query: &str) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(query.to_string());
        if query.contains("VALUES ?grp") {
            return Ok(vec![
                row(&[
                    ("grp", "http://www.wikidata.org/entity/Q458"),
                    ("population", "+447706209"),
                    ("area", "4233262"),
                    ("wikipedia", "https://en.wikipedia.org/wiki/European_Union"),
                ]),
                row(&[
                    ("grp", "http://www.wikidata.org/entity/Q458"),
                    ("flag", "http://commons.wikimedia.org/wiki/Special:FilePath/Flag%20of%20Europe.svg"),
                ]),
                row(&[
                    ("grp", "http://www.wikidata.org/entity/Q83286"),
                    ("population", "23000000"),
                ]),
            ]);
        }
        Ok(vec![
            row(&[
                ("country", "http://www.wikidata.org/entity/Q142"),
                ("iso2", "FR"),
                ("iso3", "FRA"),
                ("nuts", "FR"),
                ("population", "67000000"),
                ("site", "https://www.elysee.fr"),
                ("wikipedia", "https://en.wikipedia.org/wiki/France"),
            ]),
            row(&[
                ("country", "http://www.wikidata.org/entity/Q183"),
                ("iso2", "DE"),
                ("population", "0"),
            ]),
            row(&[("country", "http://www.wikidata.org/entity/Q16"), ("iso2", "CA")]),
        ])
    }
}

struct UnreachableWikidata;

#[async_trait]
impl KnowledgeGraphClient for UnreachableWikidata {
    async fn query(&self, _query: &str) -> Result<Vec<Row>> {
        Err(GeozonesError::KnowledgeGraph {
            message: "endpoint unreachable".to_string(),
        })
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[tokio::test]
async fn test_full_build_extracts_aggregates_and_enriches() {
    let wikidata = Arc::new(FakeWikidata::new());
    let registries = catalog::default_registries(&config(), Some(wikidata.clone()));
    let geodata = StaticSource::new()
        .with_features(NATURAL_EARTH, natural_earth_features())
        .with_features(GEO_COUNTRIES, geo_countries_features());
    let store = InMemoryZoneStore::new();

    let report = Builder::new(&registries, domain::levels())
        .with_today(today())
        .run(&store, &geodata)
        .await
        .unwrap();

    let countries = &report.extraction["country"];
    assert_eq!(countries.created, 3);
    assert_eq!(countries.skipped, 1);
    assert_eq!(countries.unmatched, 1);
    assert_eq!(countries.unchanged, 1);
    assert_eq!(report.zones, 5);

    // Fixed Natural Earth codes, then Wikidata fills what the source lacked
    let france = store.get_zone("country:fr").await.unwrap().unwrap();
    assert_eq!(france.key("iso3"), Some("fra"));
    assert_eq!(france.key("nuts"), Some("fr"));
    assert_eq!(france.population, Some(67_000_000));
    assert_eq!(france.wikidata.as_deref(), Some("Q142"));
    assert_eq!(france.dbpedia.as_deref(), Some("http://dbpedia.org/resource/France"));
    assert!(france.parents.contains("country-group:world"));
    assert!(france.parents.contains("country-group:ue"));

    // A zero population from the knowledge graph is absent and keeps the stored value
    let germany = store.get_zone("country:de").await.unwrap().unwrap();
    assert_eq!(germany.population, Some(80_594_017));
    assert_eq!(germany.wikidata.as_deref(), Some("Q183"));

    let usa = store.get_zone("country:us").await.unwrap().unwrap();
    assert!(usa.parents.contains("country-group:world"));
    assert!(!usa.parents.contains("country-group:ue"));
    assert!(store.get_zone("country:ca").await.unwrap().is_none());

    let world = report
        .aggregation
        .iter()
        .find(|s| s.group == "country-group:world")
        .unwrap();
    assert_eq!(world.members, 3);

    let ue = store.get_zone("country-group:ue").await.unwrap().unwrap();
    assert_eq!(ue.population, Some(447_706_209));
    assert_eq!(ue.area, Some(4_233_262.0));
    assert_eq!(ue.flag.as_deref(), Some("Flag_of_Europe.svg"));
    assert_eq!(ue.wikipedia.as_deref(), Some("en:European_Union"));
    assert_eq!(ue.key("default"), Some("ue"));
    assert!(ue.parents.contains("country-group:world"));

    let world = store.get_zone("country-group:world").await.unwrap().unwrap();
    assert!(world.parents.is_empty());

    let queries = wikidata.queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("wd:Q2") && queries[0].contains("wd:Q458"));
}

#[tokio::test]
async fn test_build_survives_missing_source_and_failing_knowledge_graph() {
    let registries = catalog::default_registries(&config(), Some(Arc::new(UnreachableWikidata)));
    let geodata = StaticSource::new().with_features(NATURAL_EARTH, natural_earth_features());
    let store = InMemoryZoneStore::new();

    let report = Builder::new(&registries, domain::levels())
        .with_today(today())
        .run(&store, &geodata)
        .await
        .unwrap();

    assert_eq!(report.extraction["country"].sources_failed, 1);
    assert_eq!(report.extraction["country"].created, 3);

    let failed: Vec<_> = report
        .postprocessing
        .values()
        .flatten()
        .filter(|o| o.modified.is_none())
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(failed, vec!["Wikidata countries", "Wikidata country groups"]);

    // Structural passes still ran
    let members = store
        .zones(&ZoneFilter::level("country").matching(|z| z.parents.contains("country-group:ue")))
        .await
        .unwrap();
    let codes: Vec<_> = members.iter().map(|z| z.code.as_str()).collect();
    assert_eq!(codes, vec!["de", "fr"]);
}

#[tokio::test]
async fn test_rebuild_is_stable_and_exportable() {
    let registries = catalog::default_registries(&config(), None);
    let geodata = StaticSource::new()
        .with_features(NATURAL_EARTH, natural_earth_features())
        .with_features(GEO_COUNTRIES, geo_countries_features());
    let store = InMemoryZoneStore::new();
    let builder = Builder::new(&registries, domain::levels()).with_today(today());

    builder.run(&store, &geodata).await.unwrap();
    let first = store.zones(&ZoneFilter::all()).await.unwrap();

    let report = builder.run(&store, &geodata).await.unwrap();
    assert_eq!(report.extraction["country"].created, 0);
    assert!(report.aggregation.iter().all(|s| s.attached == 0));
    assert_eq!(store.zones(&ZoneFilter::all()).await.unwrap(), first);

    let dir = tempdir().unwrap();
    let path = dir.path().join("zones.json");
    assert_eq!(store.export_json(&path).await.unwrap(), 5);
    let loaded = InMemoryZoneStore::import_json(&path).await.unwrap();
    assert_eq!(loaded.zones(&ZoneFilter::all()).await.unwrap(), first);
}

#[tokio::test]
async fn test_group_enrichment_uses_the_build_date() {
    let wikidata = Arc::new(FakeWikidata::new());
    let registries = catalog::default_registries(&config(), Some(wikidata.clone()));
    let geodata = StaticSource::new()
        .with_features(NATURAL_EARTH, natural_earth_features())
        .with_features(GEO_COUNTRIES, geo_countries_features());
    let store = InMemoryZoneStore::new();

    let mut yugoslavia = Zone::new("country-group", "yu", "Yugoslavia");
    yugoslavia.wikidata = Some("Q83286".to_string());
    yugoslavia.validity.end = NaiveDate::from_ymd_opt(2003, 2, 4);
    store.save_zone(yugoslavia).await.unwrap();

    Builder::new(&registries, domain::levels())
        .with_today(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
        .run(&store, &geodata)
        .await
        .unwrap();

    let yugoslavia = store.get_zone("country-group:yu").await.unwrap().unwrap();
    assert_eq!(yugoslavia.population, Some(23_000_000));

    let queries = wikidata.queries.lock().unwrap();
    assert!(queries[0].contains("wd:Q83286"));
}
