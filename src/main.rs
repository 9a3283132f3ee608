use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use geozones::catalog;
use geozones::config::Config;
use geozones::constants;
use geozones::domain;
use geozones::logging;
use geozones::observability::metrics;
use geozones::pipeline::source::GeoJsonSource;
use geozones::pipeline::Builder;
use geozones::storage::InMemoryZoneStore;
use geozones::wiki::{KnowledgeGraphClient, SparqlClient};

#[derive(Parser)]
#[command(name = "geozones")]
#[command(about = "Country and country-group dataset builder")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, aggregate and enrich every level, then export the zones
    Build {
        /// Configuration file (defaults to config.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output JSON file, overrides the configuration
        #[arg(long)]
        output: Option<PathBuf>,
        /// Do not query Wikidata
        #[arg(long)]
        skip_wikidata: bool,
        /// Print collected metrics in Prometheus format when done
        #[arg(long)]
        metrics: bool,
    },
    /// List levels with their registered extractors, aggregates and postprocessors
    Levels {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            output,
            skip_wikidata,
            metrics: print_metrics,
        } => {
            let config = Config::load_or_default(config.as_deref())?;
            let output = output.unwrap_or_else(|| config.output.path.clone());

            let handle = if print_metrics {
                Some(metrics::install_prometheus()?)
            } else {
                None
            };

            let knowledge_graph: Option<Arc<dyn KnowledgeGraphClient>> = if config.wikidata.enabled && !skip_wikidata {
                Some(Arc::new(SparqlClient::new(&config.wikidata)?))
            } else {
                warn!("Wikidata enrichment disabled");
                None
            };

            let registries = catalog::default_registries(&config, knowledge_graph);
            let geodata = GeoJsonSource::new(config.sources.timeout_seconds)?
                .with_id_property(constants::NATURAL_EARTH_ID);
            let store = InMemoryZoneStore::new();

            info!("Building zones into {}", output.display());
            let report = Builder::new(&registries, domain::levels()).run(&store, &geodata).await?;

            for (level, summary) in &report.extraction {
                println!(
                    "{}: {} created, {} updated, {} skipped, {} unmatched, {} failed",
                    level, summary.created, summary.updated, summary.skipped, summary.unmatched, summary.failed
                );
            }
            for summary in &report.aggregation {
                println!("{}: {} members", summary.group, summary.members);
            }
            for outcome in report.postprocessing.values().flatten() {
                match outcome.modified {
                    Some(modified) => println!("{}: {} zones modified", outcome.name, modified),
                    None => error!("Postprocessor {} failed", outcome.name),
                }
            }

            let written = store.export_json(&output).await?;
            println!("Exported {} zones to {}", written, output.display());

            if let Some(handle) = handle {
                println!("{}", handle.render());
            }
        }
        Commands::Levels { config } => {
            let config = Config::load_or_default(config.as_deref())?;
            let registries = catalog::default_registries(&config, None);

            for level in domain::levels() {
                if level.parents.is_empty() {
                    println!("{} ({})", level.label, level.id);
                } else {
                    println!("{} ({}, parents: {})", level.label, level.id, level.parents.join(", "));
                }
                for (url, name) in registries.extractors.describe(level.id) {
                    println!("  extractor: {} <- {}", name, url);
                }
                for aggregate in registries.aggregates.for_level(level.id) {
                    println!("  aggregate: {} ({} patterns)", aggregate.id(), aggregate.members.len());
                }
                for name in registries.postprocessors.names(level.id) {
                    println!("  postprocessor: {}", name);
                }
            }
        }
    }

    Ok(())
}
