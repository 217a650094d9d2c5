pub mod capper;
pub mod cluster;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod fetcher;
pub mod filter;
pub mod parser;
pub mod pipeline;
pub mod ranking;
pub mod registry;
pub mod rss_utils;
pub mod traits;
pub mod types;

pub use config::{FetchConfig, FreshnessWindow, PipelineConfig};
pub use fetcher::{fetch_all, FetchOutcome, HttpFetcher};
pub use filter::FilterEngine;
pub use parser::FeedParser;
pub use pipeline::{Pipeline, PipelineOutput};
pub use registry::SourceRegistry;
pub use traits::FetchFeed;
pub use types::*;
