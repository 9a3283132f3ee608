use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::domain::Level;
use crate::error::Result;
use crate::pipeline::aggregate::{self, AggregateRegistry, AggregationSummary};
use crate::pipeline::extract::{self, ExtractionSummary, ExtractorRegistry};
use crate::pipeline::postprocess::{self, PostprocessOutcome, PostprocessorRegistry};
use crate::pipeline::source::GeodataSource;
use crate::storage::ZoneStore;

/// Every declaration the build runs, constructed once at startup
#[derive(Default)]
pub struct Registries {
    pub extractors: ExtractorRegistry,
    pub aggregates: AggregateRegistry,
    pub postprocessors: PostprocessorRegistry,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub extraction: BTreeMap<String, ExtractionSummary>,
    pub aggregation: Vec<AggregationSummary>,
    pub postprocessing: BTreeMap<String, Vec<PostprocessOutcome>>,
    pub zones: usize,
}

/// Runs extraction, then aggregation, then postprocessing, each level in order
pub struct Builder<'a> {
    registries: &'a Registries,
    levels: Vec<Level>,
    today: NaiveDate,
}

impl<'a> Builder<'a> {
    pub fn new(registries: &'a Registries, levels: Vec<Level>) -> Self {
        Self {
            registries,
            levels,
            today: Utc::now().date_naive(),
        }
    }

    /// Date used to decide which zones are current
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn run(&self, store: &dyn ZoneStore, geodata: &dyn GeodataSource) -> Result<BuildReport> {
        let started_at = Utc::now();
        let mut report = BuildReport {
            started_at,
            finished_at: started_at,
            extraction: BTreeMap::new(),
            aggregation: Vec::new(),
            postprocessing: BTreeMap::new(),
            zones: 0,
        };

        info!("Extracting {} levels", self.levels.len());
        for level in &self.levels {
            let summary = extract::run_level(&self.registries.extractors, level.id, store, geodata).await;
            report.extraction.insert(level.id.to_string(), summary);
        }

        // Wildcard members are only resolvable once every level is extracted
        info!("Building aggregates");
        for level in &self.levels {
            let summaries = aggregate::build_level(&self.registries.aggregates, level.id, store, self.today).await;
            report.aggregation.extend(summaries);
        }

        info!("Postprocessing");
        for level in &self.levels {
            let outcomes = postprocess::run_level(&self.registries.postprocessors, level.id, store, self.today).await;
            report.postprocessing.insert(level.id.to_string(), outcomes);
        }

        report.zones = store.count().await?;
        report.finished_at = Utc::now();
        info!(
            "Build finished with {} zones in {}s",
            report.zones,
            (report.finished_at - report.started_at).num_seconds()
        );
        Ok(report)
    }
}
