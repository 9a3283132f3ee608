// Knowledge-graph access: the client contract, the Wikidata SPARQL client and
// the helpers translating its values into zone fields

pub mod sparql;
pub mod urls;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

pub use sparql::SparqlClient;
pub use urls::{media_url_to_path, uri_to_id, wikipedia_to_dbpedia, wikipedia_url_to_id};

/// One result row: binding name to value. Unbound optional variables are absent.
pub type Row = BTreeMap<String, String>;

/// Executes structured queries against a knowledge graph
#[async_trait]
pub trait KnowledgeGraphClient: Send + Sync {
    async fn query(&self, query: &str) -> Result<Vec<Row>>;
}

/// Collapse rows sharing the same `column` value into one row.
///
/// Each OPTIONAL clause of a query can match independently, so one entity may
/// come back as several rows. The first value seen for a field is kept, later
/// rows only fill fields still missing. Rows without `column` are dropped.
/// Output follows the order of first appearance.
pub fn reduce_rows(rows: Vec<Row>, column: &str) -> Vec<Row> {
    let mut order: Vec<String> = Vec::new();
    let mut reduced: BTreeMap<String, Row> = BTreeMap::new();

    for row in rows {
        let Some(key) = row.get(column).cloned() else {
            continue;
        };
        match reduced.get_mut(&key) {
            Some(existing) => {
                for (field, value) in row {
                    existing.entry(field).or_insert(value);
                }
            }
            None => {
                order.push(key.clone());
                reduced.insert(key, row);
            }
        }
    }

    order.into_iter().filter_map(|key| reduced.remove(&key)).collect()
}

/// Parse a knowledge-graph quantity as a count. Zero and unparsable values are absent.
pub fn parse_count(value: Option<&str>) -> Option<u64> {
    parse_quantity(value)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
        .filter(|v| *v != 0)
}

/// Parse a knowledge-graph quantity as a measure. Zero and unparsable values are absent.
pub fn parse_measure(value: Option<&str>) -> Option<f64> {
    parse_quantity(value).filter(|v| *v != 0.0)
}

fn parse_quantity(value: Option<&str>) -> Option<f64> {
    let raw = value?.trim();
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            tracing::debug!("Ignoring unparsable quantity {:?}", raw);
            None
        }
    }
}
