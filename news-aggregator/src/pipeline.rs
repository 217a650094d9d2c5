use crate::capper::{cap_per_source, finalize, sort_chronological};
use crate::cluster::cluster;
use crate::config::{FreshnessWindow, PipelineConfig};
use crate::dedup::deduplicate;
use crate::fetcher::fetch_all;
use crate::filter::{self, FilterEngine};
use crate::parser::FeedParser;
use crate::ranking::ranking_snapshot;
use crate::registry::SourceRegistry;
use crate::traits::FetchFeed;
use crate::types::{FilterRuleSet, Item, Result, SourceWarning};
use chrono::{DateTime, FixedOffset, Utc};
use interfaces::defs::{ItemFile, OutputItem, RankingSnapshot, RunStats, WarningRecord};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

/// One run of the pipeline over a fixed set of sources and rules.
pub struct Pipeline {
    registry: SourceRegistry,
    fetcher: Box<dyn FetchFeed>,
    rules: FilterRuleSet,
    config: PipelineConfig,
}

/// Everything a run produced, before it is written anywhere.
#[derive(Debug)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window: FreshnessWindow,
    pub zone: FixedOffset,
    pub items: Vec<OutputItem>,
    pub warnings: Vec<SourceWarning>,
    pub stats: RunStats,
}

impl PipelineOutput {
    pub fn to_item_file(&self) -> ItemFile {
        ItemFile {
            run_id: self.run_id.to_string(),
            generated_at: self.generated_at.with_timezone(&self.zone),
            freshness_window: self.window.to_string(),
            items: self.items.clone(),
            warnings: self.warnings.iter().map(WarningRecord::from).collect(),
            stats: self.stats.clone(),
        }
    }

    pub fn ranking_snapshot(&self, config: &PipelineConfig) -> RankingSnapshot {
        ranking_snapshot(
            &self.items,
            self.generated_at,
            config.ranking_window_hours,
            config.ranking_max_items,
            self.zone,
        )
    }
}

impl Pipeline {
    pub fn new(
        registry: SourceRegistry,
        fetcher: Box<dyn FetchFeed>,
        rules: FilterRuleSet,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { registry, fetcher, rules, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch every source, then run the single-threaded stages over the
    /// collected items. `now` anchors the freshness window.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<PipelineOutput> {
        let zone = self.config.reference_offset()?;
        let window = self.config.freshness_window();
        let run_id = Uuid::new_v4();
        let mut stats = RunStats {
            sources_total: self.registry.source_count(),
            ..RunStats::default()
        };

        info!("Starting run {} over {} sources", run_id, self.registry.source_count());

        let fetched = fetch_all(self.fetcher.as_ref(), self.registry.sources(), self.config.fetch.workers).await;
        let mut warnings = fetched.warnings;

        // Completion order is arbitrary; registry order makes first-wins reproducible.
        let position: HashMap<&str, usize> = self
            .registry
            .sources()
            .iter()
            .enumerate()
            .map(|(i, source)| (source.id.as_str(), i))
            .collect();
        let mut documents = fetched.documents;
        documents.sort_by_key(|doc| position.get(doc.descriptor.id.as_str()).copied().unwrap_or(usize::MAX));

        let parser = FeedParser::new(zone);
        let mut items: Vec<Item> = Vec::new();
        for document in documents {
            let descriptor = document.descriptor.clone();
            match parser.parse(document) {
                Ok(mut stream) => {
                    let before = items.len();
                    items.extend(stream.by_ref());
                    info!(
                        "{}: {} items ({} entries without a link)",
                        stream.source_id(),
                        items.len() - before,
                        stream.skipped()
                    );
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}", descriptor.id, e);
                    warnings.push(SourceWarning::from_error(&descriptor.id, &e));
                }
            }
        }
        stats.sources_failed = warnings
            .iter()
            .map(|w| w.source_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        stats.items_parsed = items.len();
        info!("Total items parsed: {}", items.len());

        let items = deduplicate(items);
        stats.items_after_dedupe = items.len();

        let engine = FilterEngine::compile(&self.rules);
        warnings.extend(engine.rejected().iter().cloned());

        info!("Dropping items older than {}", window);
        let filtered = filter::apply(items, &engine, window, now);
        stats.dropped_by_rule = filtered.dropped_by_rule;
        stats.dropped_as_stale = filtered.dropped_as_stale;

        let mut items = filtered.kept;
        sort_chronological(&mut items);
        let (items, _) = cap_per_source(items, self.config.max_items_per_source);
        stats.items_after_cap = items.len();

        let clusters = cluster(items, self.config.similarity_threshold, zone);
        stats.clusters = clusters.len();

        let items = finalize(clusters, zone);
        info!(
            "Run {} finished: {} items in {} clusters, {} warnings, window {}",
            run_id,
            items.len(),
            stats.clusters,
            warnings.len(),
            window
        );

        Ok(PipelineOutput {
            run_id,
            generated_at: now,
            window,
            zone,
            items,
            warnings,
            stats,
        })
    }
}
