use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

pub mod registry;

pub use registry::AggregateRegistry;

use crate::constants;
use crate::domain::{self, Zone};
use crate::error::{GeozonesError, Result};
use crate::observability::metrics::{emit_counter, emit_gauge_for, MetricName};
use crate::pipeline::merge::apply_non_null_fields;
use crate::storage::{ZoneFilter, ZoneStore, ZoneUpdate};

/// A group member reference: one zone, or every current zone of a level
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberPattern {
    Zone { level: String, code: String },
    Level(String),
}

impl MemberPattern {
    pub fn zone(level: &str, code: &str) -> Self {
        MemberPattern::Zone {
            level: level.to_string(),
            code: code.to_string(),
        }
    }

    pub fn level(level: &str) -> Self {
        MemberPattern::Level(level.to_string())
    }
}

impl FromStr for MemberPattern {
    type Err = GeozonesError;

    /// `country:*` or `country:fr`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((level, "*")) if !level.is_empty() => Ok(MemberPattern::level(level)),
            Some((level, code)) if !level.is_empty() && !code.is_empty() => Ok(MemberPattern::zone(level, code)),
            _ => Err(GeozonesError::Config(format!("invalid member pattern '{}'", s))),
        }
    }
}

impl fmt::Display for MemberPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberPattern::Zone { level, code } => write!(f, "{}:{}", level, code),
            MemberPattern::Level(level) => write!(f, "{}:*", level),
        }
    }
}

/// Declarative group definition. Membership is only computed at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub level: String,
    pub code: String,
    pub label: String,
    pub members: Vec<MemberPattern>,
    pub parents: Vec<String>,
    pub keys: BTreeMap<String, String>,
    pub wikidata: Option<String>,
    pub wikipedia: Option<String>,
}

impl Aggregate {
    pub fn new(code: &str, label: &str, members: Vec<MemberPattern>) -> Self {
        Self {
            level: constants::COUNTRY_GROUP.to_string(),
            code: code.to_string(),
            label: label.to_string(),
            members,
            parents: Vec::new(),
            keys: BTreeMap::new(),
            wikidata: None,
            wikipedia: None,
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    pub fn with_key(mut self, scheme: &str, value: &str) -> Self {
        self.keys.insert(scheme.to_string(), value.to_string());
        self
    }

    pub fn with_wikidata(mut self, id: &str) -> Self {
        self.wikidata = Some(id.to_string());
        self
    }

    pub fn with_wikipedia(mut self, id: &str) -> Self {
        self.wikipedia = Some(id.to_string());
        self
    }

    pub fn id(&self) -> String {
        constants::zone_id(&self.level, &self.code)
    }

    /// The group's own zone record, without members
    pub fn to_zone(&self) -> Zone {
        let mut zone = Zone::new(&self.level, &self.code, &self.label);
        zone.parents.extend(self.parents.iter().cloned());
        zone.keys = self.keys.clone();
        zone.wikidata = self.wikidata.clone();
        zone.wikipedia = self.wikipedia.clone();
        zone
    }
}

/// Expand member patterns against the store as it is now.
///
/// Wildcards match every zone of the level current on `today`. Literal
/// references only count when the zone exists. Never cached: call it after
/// the referenced levels are fully extracted.
pub async fn resolve_members(
    patterns: &[MemberPattern],
    store: &dyn ZoneStore,
    today: NaiveDate,
) -> Result<BTreeSet<String>> {
    let mut members = BTreeSet::new();
    for pattern in patterns {
        match pattern {
            MemberPattern::Level(level) => {
                let zones = store.zones(&ZoneFilter::level(level).current_on(today)).await?;
                members.extend(zones.into_iter().map(|z| z.id));
            }
            MemberPattern::Zone { level, code } => {
                let id = constants::zone_id(level, code);
                if store.get_zone(&id).await?.is_some() {
                    members.insert(id);
                }
            }
        }
    }
    Ok(members)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationSummary {
    pub group: String,
    pub members: usize,
    /// Members that gained the group as parent during this run
    pub attached: u64,
}

/// Save every group of `level` and attach it as parent of its resolved members
pub async fn build_level(
    registry: &AggregateRegistry,
    level: &str,
    store: &dyn ZoneStore,
    today: NaiveDate,
) -> Vec<AggregationSummary> {
    let mut summaries = Vec::new();

    for aggregate in registry.for_level(level) {
        let id = aggregate.id();
        match build_one(aggregate, store, today).await {
            Ok(summary) => {
                info!("Built {} with {} members", id, summary.members);
                emit_counter(MetricName::AggregatesBuilt, 1);
                emit_gauge_for(MetricName::AggregateMembers, &id, summary.members as f64);
                summaries.push(summary);
            }
            Err(e) => warn!("Unable to build aggregate {}: {}", id, e),
        }
    }

    summaries
}

/// Whether the member's level lists `group_level` among its parent levels
fn accepts_group(member_id: &str, group_level: &str) -> bool {
    member_id
        .split_once(':')
        .and_then(|(level, _)| domain::level(level))
        .is_some_and(|level| level.accepts_parent(group_level))
}

async fn build_one(aggregate: &Aggregate, store: &dyn ZoneStore, today: NaiveDate) -> Result<AggregationSummary> {
    let id = aggregate.id();
    store.save_zone(aggregate.to_zone()).await?;

    let mut members = resolve_members(&aggregate.members, store, today).await?;
    members.remove(&id);
    let (members, rejected): (BTreeSet<String>, BTreeSet<String>) = members
        .into_iter()
        .partition(|member| accepts_group(member, &aggregate.level));
    if !rejected.is_empty() {
        warn!("{} cannot be a parent of {:?}", id, rejected);
    }

    let attached = apply_non_null_fields(
        store,
        &ZoneFilter::ids(members.iter().cloned()),
        &ZoneUpdate::new().add_parent(id.clone()),
    )
    .await?;

    Ok(AggregationSummary {
        group: id,
        members: members.len(),
        attached,
    })
}
