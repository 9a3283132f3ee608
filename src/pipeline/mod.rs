// Build pipeline: extraction, aggregation, postprocessing and knowledge-graph enrichment

pub mod aggregate;
pub mod enrich;
pub mod extract;
pub mod merge;
pub mod orchestrator;
pub mod postprocess;
pub mod source;

pub use merge::apply_non_null_fields;
pub use orchestrator::{BuildReport, Builder, Registries};
