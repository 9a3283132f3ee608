use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::constants::keys;
use crate::domain::Zone;

type Predicate = Arc<dyn Fn(&Zone) -> bool + Send + Sync>;

/// Selects zones for iteration or bulk updates. Every criterion set must match.
#[derive(Clone, Default)]
pub struct ZoneFilter {
    level: Option<String>,
    ids: Option<BTreeSet<String>>,
    codes: Option<BTreeSet<String>>,
    with_wikidata: bool,
    current_on: Option<NaiveDate>,
    predicate: Option<Predicate>,
}

impl ZoneFilter {
    /// Matches every zone
    pub fn all() -> Self {
        Self::default()
    }

    pub fn level(level: &str) -> Self {
        Self {
            level: Some(level.to_string()),
            ..Self::default()
        }
    }

    pub fn id(id: &str) -> Self {
        Self {
            ids: Some(std::iter::once(id.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.codes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_wikidata(mut self) -> Self {
        self.with_wikidata = true;
        self
    }

    pub fn current_on(mut self, date: NaiveDate) -> Self {
        self.current_on = Some(date);
        self
    }

    /// Arbitrary extra predicate
    pub fn matching(mut self, predicate: impl Fn(&Zone) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn matches(&self, zone: &Zone) -> bool {
        if let Some(level) = &self.level {
            if &zone.level != level {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&zone.id) {
                return false;
            }
        }
        if let Some(codes) = &self.codes {
            if !codes.contains(&zone.code) {
                return false;
            }
        }
        if self.with_wikidata && zone.wikidata.is_none() {
            return false;
        }
        if let Some(date) = self.current_on {
            if !zone.is_current(date) {
                return false;
            }
        }
        self.predicate.as_ref().map_or(true, |p| p(zone))
    }
}

impl fmt::Debug for ZoneFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneFilter")
            .field("level", &self.level)
            .field("ids", &self.ids)
            .field("codes", &self.codes)
            .field("with_wikidata", &self.with_wikidata)
            .field("current_on", &self.current_on)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// A zone field that partial updates may write. `code` is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ZoneField {
    Name,
    Population,
    Area,
    Wikidata,
    Wikipedia,
    Dbpedia,
    Website,
    Flag,
    Key(String),
}

impl ZoneField {
    pub fn key(scheme: &str) -> Self {
        ZoneField::Key(scheme.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
    Float(f64),
}

impl FieldValue {
    fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }

    fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// A partial, field-level zone update.
///
/// Values only enter the update through [`ZoneUpdate::set`], which drops
/// absent and empty values: applying an update never blanks a stored field.
/// Parents are added by set-union and never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneUpdate {
    fields: BTreeMap<ZoneField, FieldValue>,
    add_parents: BTreeSet<String>,
}

impl ZoneUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Null-filtered assignment: `None` and empty text leave the field out
    pub fn set<V: Into<FieldValue>>(mut self, field: ZoneField, value: Option<V>) -> Self {
        if let Some(value) = value.map(Into::into) {
            if !value.is_empty() {
                self.fields.insert(field, value);
            }
        }
        self
    }

    pub fn add_parent(mut self, parent: impl Into<String>) -> Self {
        self.add_parents.insert(parent.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.add_parents.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&ZoneField, &FieldValue)> {
        self.fields.iter()
    }

    pub fn get(&self, field: &ZoneField) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Apply to a zone, returning whether anything changed
    pub fn apply(&self, zone: &mut Zone) -> bool {
        let before = zone.clone();

        for (field, value) in &self.fields {
            match field {
                ZoneField::Name => zone.name = value.as_text(),
                ZoneField::Population => match value {
                    FieldValue::Integer(i) => zone.population = Some(*i),
                    FieldValue::Float(f) if *f >= 0.0 => zone.population = Some(f.round() as u64),
                    other => tracing::debug!("Ignoring non numeric population {:?} for {}", other, zone.id),
                },
                ZoneField::Area => match value {
                    FieldValue::Float(f) => zone.area = Some(*f),
                    FieldValue::Integer(i) => zone.area = Some(*i as f64),
                    other => tracing::debug!("Ignoring non numeric area {:?} for {}", other, zone.id),
                },
                ZoneField::Wikidata => zone.wikidata = Some(value.as_text()),
                ZoneField::Wikipedia => zone.wikipedia = Some(value.as_text()),
                ZoneField::Dbpedia => zone.dbpedia = Some(value.as_text()),
                ZoneField::Website => zone.website = Some(value.as_text()),
                ZoneField::Flag => zone.flag = Some(value.as_text()),
                ZoneField::Key(scheme) => {
                    let text = value.as_text();
                    let locked = keys::IMMUTABLE.contains(&scheme.as_str())
                        && zone.keys.get(scheme).is_some_and(|current| current != &text);
                    if locked {
                        tracing::debug!("Refusing to change immutable key {} of {}", scheme, zone.id);
                    } else {
                        zone.keys.insert(scheme.clone(), text);
                    }
                }
            }
        }

        zone.parents.extend(self.add_parents.iter().cloned());

        *zone != before
    }
}
