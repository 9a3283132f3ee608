use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::constants;

/// A stored geographic entity (country, country group)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// `{level}:{code}`
    pub id: String,
    pub level: String,
    /// Unique within the level, immutable once stored
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    /// Ids of parent zones. Only ever grows.
    #[serde(default)]
    pub parents: BTreeSet<String>,
    /// Alternate identifiers by scheme (iso2, iso3, un, fips, nuts, osm, geonames, default)
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbpedia: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(default)]
    pub validity: Validity,
}

/// Period during which a zone exists. Open bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl Validity {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| start <= date) && self.end.map_or(true, |end| date < end)
    }
}

impl Zone {
    pub fn new(level: &str, code: &str, name: &str) -> Self {
        Self {
            id: constants::zone_id(level, code),
            level: level.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            population: None,
            area: None,
            parents: BTreeSet::new(),
            keys: BTreeMap::new(),
            wikidata: None,
            wikipedia: None,
            dbpedia: None,
            website: None,
            flag: None,
            validity: Validity::default(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.insert(parent.into());
        self
    }

    /// Set a key, ignoring missing values
    pub fn with_key(mut self, scheme: &str, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.keys.insert(scheme.to_string(), value);
        }
        self
    }

    pub fn key(&self, scheme: &str) -> Option<&str> {
        self.keys.get(scheme).map(|v| v.as_str())
    }

    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.validity.contains(today)
    }
}

/// A category of zones sharing a schema and registrations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub id: &'static str,
    pub label: &'static str,
    /// Levels this one can be attached to
    pub parents: &'static [&'static str],
}

pub const COUNTRY_GROUP: Level = Level {
    id: constants::COUNTRY_GROUP,
    label: "Country group",
    parents: &[],
};

pub const COUNTRY: Level = Level {
    id: constants::COUNTRY,
    label: "Country",
    parents: &[constants::COUNTRY_GROUP],
};

impl Level {
    /// Whether zones of this level may be attached to a zone of `level`
    pub fn accepts_parent(&self, level: &str) -> bool {
        self.parents.iter().any(|parent| *parent == level)
    }
}

/// Built-in levels, in processing order
pub fn levels() -> Vec<Level> {
    vec![COUNTRY_GROUP, COUNTRY]
}

/// Built-in level by id
pub fn level(id: &str) -> Option<Level> {
    levels().into_iter().find(|level| level.id == id)
}

/// Outcome of persisting a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Updated,
    NoChange,
}
