//! Build metrics, recorded through the `metrics` facade using Prometheus
//! naming conventions. Nothing is recorded unless a recorder is installed
//! (see [`install_prometheus`]).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;

use crate::error::{GeozonesError, Result};

/// Every metric name emitted by the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Extraction
    SourcesFetchSuccess,
    SourcesFetchError,
    FeaturesExtracted,
    FeaturesMatched,
    FeaturesSkipped,
    FeaturesUnmatched,
    FeaturesFailed,

    // Aggregation
    AggregatesBuilt,
    AggregateMembers,

    // Postprocessing
    PostprocessorsRun,
    PostprocessorsFailed,
    ZonesUpdated,

    // Knowledge graph
    KnowledgeGraphQueries,
    KnowledgeGraphQueryDuration,
    KnowledgeGraphRows,
    KnowledgeGraphRowsDropped,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesFetchSuccess => "geozones_sources_fetch_success_total",
            MetricName::SourcesFetchError => "geozones_sources_fetch_error_total",
            MetricName::FeaturesExtracted => "geozones_features_extracted_total",
            MetricName::FeaturesMatched => "geozones_features_matched_total",
            MetricName::FeaturesSkipped => "geozones_features_skipped_total",
            MetricName::FeaturesUnmatched => "geozones_features_unmatched_total",
            MetricName::FeaturesFailed => "geozones_features_failed_total",
            MetricName::AggregatesBuilt => "geozones_aggregates_built_total",
            MetricName::AggregateMembers => "geozones_aggregate_members",
            MetricName::PostprocessorsRun => "geozones_postprocessors_run_total",
            MetricName::PostprocessorsFailed => "geozones_postprocessors_failed_total",
            MetricName::ZonesUpdated => "geozones_zones_updated_total",
            MetricName::KnowledgeGraphQueries => "geozones_kg_queries_total",
            MetricName::KnowledgeGraphQueryDuration => "geozones_kg_query_duration_seconds",
            MetricName::KnowledgeGraphRows => "geozones_kg_rows_total",
            MetricName::KnowledgeGraphRowsDropped => "geozones_kg_rows_dropped_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn emit_counter(name: MetricName, value: u64) {
    ::metrics::counter!(name.as_str()).increment(value);
}

pub fn emit_counter_for(name: MetricName, level: &str, value: u64) {
    ::metrics::counter!(name.as_str(), "level" => level.to_string()).increment(value);
}

pub fn emit_gauge_for(name: MetricName, group: &str, value: f64) {
    ::metrics::gauge!(name.as_str(), "group" => group.to_string()).set(value);
}

pub fn emit_histogram(name: MetricName, value: f64) {
    ::metrics::histogram!(name.as_str()).record(value);
}

/// Install a Prometheus recorder and return the handle used to render it
pub fn install_prometheus() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| GeozonesError::Config(format!("failed to install metrics recorder: {}", e)))
}
