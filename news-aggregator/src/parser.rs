use crate::dates::parse_timestamp;
use crate::dedup::normalize_link;
use crate::rss_utils::text::{clean_title, extract_text_from_html, truncate_chars};
use crate::types::{AggregatorError, FeedDescriptor, Item, RawDocument, Result};
use chrono::FixedOffset;
use feed_rs::model::{Entry, Link};
use feed_rs::parser::{self, Parser};
use std::sync::Arc;
use tracing::{debug, info};

pub const UNTITLED: &str = "No title";
pub const SUMMARY_MAX_CHARS: usize = 250;

/// Turns fetched documents into [`Item`]s.
///
/// Dates inside the feed go through the crate's own grammar list instead of
/// feed-rs' lenient default, so every source is read the same way.
pub struct FeedParser {
    parser: Parser,
}

impl FeedParser {
    /// `regional` is the offset assumed for timestamps that carry no zone.
    pub fn new(regional: FixedOffset) -> Self {
        let parser = parser::Builder::new()
            .timestamp_parser(move |text| parse_timestamp(text, regional))
            .build();
        Self { parser }
    }

    /// Parse one document. Entries are converted lazily as the returned
    /// stream is consumed.
    pub fn parse(&self, document: RawDocument) -> Result<ItemStream> {
        let RawDocument { descriptor, format, body } = document;

        let Some(format) = format else {
            return Err(AggregatorError::UnsupportedFormat);
        };
        debug!("Parsing {} document from {} ({} bytes)", format, descriptor.id, body.len());

        let feed = self
            .parser
            .parse(&body[..])
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        info!("Parsed feed {} with {} entries", descriptor.id, feed.entries.len());
        Ok(ItemStream {
            descriptor,
            entries: feed.entries.into_iter(),
            skipped: 0,
        })
    }
}

/// Items of one parsed feed, in document order.
pub struct ItemStream {
    descriptor: Arc<FeedDescriptor>,
    entries: std::vec::IntoIter<Entry>,
    skipped: usize,
}

impl ItemStream {
    pub fn source_id(&self) -> &str {
        &self.descriptor.id
    }

    /// Entries dropped so far for lack of a link.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for ItemStream {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        for entry in self.entries.by_ref() {
            match build_item(entry, &self.descriptor) {
                Some(item) => return Some(item),
                None => self.skipped += 1,
            }
        }
        None
    }
}

/// Prefer the entry's alternate link; Atom entries may also carry self and
/// enclosure links.
fn primary_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|link| link.href.trim())
        .filter(|href| !href.is_empty())
}

fn build_item(entry: Entry, descriptor: &FeedDescriptor) -> Option<Item> {
    let Some(link) = primary_link(&entry.links).map(str::to_string) else {
        debug!("Skipping entry {:?} from {}: no link", entry.id, descriptor.id);
        return None;
    };

    let title = entry
        .title
        .as_ref()
        .map(|t| clean_title(&t.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.as_str())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))
        .map(extract_text_from_html)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(&s, SUMMARY_MAX_CHARS));

    Some(Item {
        title,
        normalized_link: normalize_link(&link),
        link,
        published_at: entry.published.or(entry.updated),
        summary,
        source_id: descriptor.id.clone(),
        source_name: descriptor.name.clone(),
        category: descriptor.category,
    })
}
