use crate::rss_utils::url::is_valid_feed_url;
use crate::types::{AggregatorError, FeedDescriptor, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The validated list of sources for one run. Descriptors are shared with
/// the fetch workers and the items they produce, never copied per item.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<FeedDescriptor>>,
}

impl SourceRegistry {
    pub fn new(descriptors: Vec<FeedDescriptor>) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(AggregatorError::NoSources);
        }

        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.id.as_str()) {
                return Err(AggregatorError::DuplicateSource { id: descriptor.id.clone() });
            }
            if !is_valid_feed_url(&descriptor.feed) {
                return Err(AggregatorError::Config(format!(
                    "source {} has an invalid feed URL: {}",
                    descriptor.id, descriptor.feed
                )));
            }
            if descriptor.allow_invalid_certs {
                warn!(
                    "Source {} ({}) is fetched without certificate verification",
                    descriptor.id, descriptor.feed
                );
            }
        }

        info!("Loaded {} sources", descriptors.len());
        Ok(Self {
            sources: descriptors.into_iter().map(Arc::new).collect(),
        })
    }

    /// Read a JSON array of descriptors.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let descriptors: Vec<FeedDescriptor> = serde_json::from_str(raw)?;
        Self::new(descriptors)
    }

    pub fn sources(&self) -> &[Arc<FeedDescriptor>] {
        &self.sources
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// True if any source opted out of certificate verification.
    pub fn has_insecure_sources(&self) -> bool {
        self.sources.iter().any(|source| source.allow_invalid_certs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCES: &str = r#"[
        {"id": "mint", "name": "Mint", "url": "https://www.livemint.com", "feed": "https://www.livemint.com/rss/markets"},
        {"id": "yt-cnbc", "name": "CNBC TV18", "url": "https://youtube.com", "feed": "https://www.youtube.com/feeds/videos.xml?channel_id=abc", "category": "Videos"},
        {"id": "nse", "name": "NSE", "url": "https://nseindia.com", "feed": "https://nsearchives.nseindia.com/content/RSS/Circulars.xml", "allow_invalid_certs": true}
    ]"#;

    #[test]
    fn loads_valid_list() {
        let registry = SourceRegistry::from_json(SOURCES).unwrap();
        assert_eq!(registry.source_count(), 3);
        assert!(registry.has_insecure_sources());
        let cnbc = registry.sources().iter().find(|s| s.id == "yt-cnbc").unwrap();
        assert_eq!(cnbc.name, "CNBC TV18");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = r#"[
            {"id": "a", "name": "A", "url": "https://a.com", "feed": "https://a.com/rss"},
            {"id": "a", "name": "A again", "url": "https://a.com", "feed": "https://a.com/rss2"}
        ]"#;
        let err = SourceRegistry::from_json(raw).unwrap_err();
        assert!(matches!(err, AggregatorError::DuplicateSource { id } if id == "a"));
    }

    #[test]
    fn empty_list_is_fatal() {
        assert!(matches!(SourceRegistry::from_json("[]"), Err(AggregatorError::NoSources)));
    }

    #[test]
    fn rejects_non_http_feed() {
        let raw = r#"[{"id": "a", "name": "A", "url": "https://a.com", "feed": "ftp://a.com/rss"}]"#;
        assert!(matches!(SourceRegistry::from_json(raw), Err(AggregatorError::Config(_))));
    }
}
