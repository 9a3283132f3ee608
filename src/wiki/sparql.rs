use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{KnowledgeGraphClient, Row};
use crate::config::WikidataConfig;
use crate::error::{GeozonesError, Result};
use crate::observability::metrics::{emit_counter, emit_histogram, MetricName};

/// SPARQL 1.1 JSON results document
#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

/// Blocking request/response client for a SPARQL endpoint (Wikidata by default)
pub struct SparqlClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SparqlClient {
    pub fn new(config: &WikidataConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

/// Flatten a results document into rows
fn parse_results(body: &str) -> Result<Vec<Row>> {
    let response: SparqlResponse = serde_json::from_str(body)?;
    Ok(response
        .results
        .bindings
        .into_iter()
        .map(|binding| binding.into_iter().map(|(name, v)| (name, v.value)).collect())
        .collect())
}

#[async_trait]
impl KnowledgeGraphClient for SparqlClient {
    async fn query(&self, query: &str) -> Result<Vec<Row>> {
        let start = Instant::now();
        debug!("Sending SPARQL query to {}", self.endpoint);
        emit_counter(MetricName::KnowledgeGraphQueries, 1);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeozonesError::KnowledgeGraph {
                message: format!("{} answered {}", self.endpoint, status),
            });
        }

        let body = response.text().await?;
        let rows = parse_results(&body)?;

        emit_histogram(MetricName::KnowledgeGraphQueryDuration, start.elapsed().as_secs_f64());
        emit_counter(MetricName::KnowledgeGraphRows, rows.len() as u64);
        info!("SPARQL query returned {} rows in {:.2}s", rows.len(), start.elapsed().as_secs_f64());
        Ok(rows)
    }
}
