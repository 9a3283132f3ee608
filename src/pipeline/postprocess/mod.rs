use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info};

pub mod processors;

use crate::observability::metrics::{emit_counter_for, MetricName};
use crate::storage::ZoneStore;

/// An enrichment pass run after extraction and aggregation.
///
/// Implementations must be idempotent and only perform partial updates.
#[async_trait]
pub trait Postprocessor: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the number of zones modified. `today` is the build date.
    async fn process(&self, store: &dyn ZoneStore, today: NaiveDate) -> anyhow::Result<u64>;
}

/// Ordered postprocessors per level
#[derive(Default)]
pub struct PostprocessorRegistry {
    processors: HashMap<String, Vec<Box<dyn Postprocessor>>>,
}

impl PostprocessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, level: &str, processor: Box<dyn Postprocessor>) {
        self.processors.entry(level.to_string()).or_default().push(processor);
    }

    pub fn for_level(&self, level: &str) -> &[Box<dyn Postprocessor>] {
        self.processors.get(level).map(|p| p.as_slice()).unwrap_or(&[])
    }

    pub fn names(&self, level: &str) -> Vec<&str> {
        self.for_level(level).iter().map(|p| p.name()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostprocessOutcome {
    pub name: String,
    /// `None` when the postprocessor failed
    pub modified: Option<u64>,
}

/// Run a level's postprocessors one after the other. A failure is logged and the next one runs.
pub async fn run_level(
    registry: &PostprocessorRegistry,
    level: &str,
    store: &dyn ZoneStore,
    today: NaiveDate,
) -> Vec<PostprocessOutcome> {
    let mut outcomes = Vec::new();

    for processor in registry.for_level(level) {
        info!("Running {} on {}", processor.name(), level);
        emit_counter_for(MetricName::PostprocessorsRun, level, 1);

        let modified = match processor.process(store, today).await {
            Ok(modified) => {
                info!("{} modified {} zones", processor.name(), modified);
                Some(modified)
            }
            Err(e) => {
                error!("{} failed: {:#}", processor.name(), e);
                emit_counter_for(MetricName::PostprocessorsFailed, level, 1);
                None
            }
        };

        outcomes.push(PostprocessOutcome {
            name: processor.name().to_string(),
            modified,
        });
    }

    outcomes
}
