use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use news_aggregator::{FilterRuleSet, HttpFetcher, Pipeline, PipelineConfig, SourceRegistry};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Fetch every configured feed once and write the deduplicated, filtered and
/// clustered item list as JSON.
#[derive(Parser, Debug)]
#[command(name = "news-aggregator", version, about)]
struct Args {
    /// JSON array of feed descriptors
    #[arg(long)]
    sources: PathBuf,

    /// JSON filter rules (title_patterns, url_patterns)
    #[arg(long)]
    filters: Option<PathBuf>,

    /// Pipeline configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the item file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write the snapshot handed to the ranking step
    #[arg(long)]
    ranking_snapshot: Option<PathBuf>,
}

fn load_rules(path: Option<&Path>) -> anyhow::Result<FilterRuleSet> {
    let Some(path) = path else {
        warn!("No filter rules given, nothing will be dropped by rule");
        return Ok(FilterRuleSet::default());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let registry = SourceRegistry::load(&args.sources)
        .with_context(|| format!("loading sources from {}", args.sources.display()))?;
    let rules = load_rules(args.filters.as_deref())?;

    let fetcher = HttpFetcher::new(config.fetch.clone(), registry.has_insecure_sources())
        .context("building HTTP client")?;
    let pipeline = Pipeline::new(registry, Box::new(fetcher), rules, config)?;

    let output = pipeline.run(Utc::now()).await?;
    for warning in &output.warnings {
        warn!("{} [{}]: {}", warning.source_id, warning.kind.as_str(), warning.message);
    }

    write_json(args.output.as_deref(), &output.to_item_file())?;
    if let Some(path) = &args.ranking_snapshot {
        write_json(Some(path), &output.ranking_snapshot(pipeline.config()))?;
    }

    Ok(())
}
