use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// Boundary note:
// Everything in this file is exchanged with something outside the pipeline,
// either as configuration (feed list, filter rules) or as a JSON file read by
// the renderer and the ranking step. Keep these shapes stable; the pipeline's
// internal types live in the aggregator crate and convert into these at the edge.

/// Routing category of a feed, spelled the way the source list spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceCategory {
    #[default]
    #[serde(rename = "News")]
    PrimaryContent,
    #[serde(rename = "Videos")]
    Video,
    #[serde(rename = "Twitter")]
    Social,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::PrimaryContent => "News",
            SourceCategory::Video => "Videos",
            SourceCategory::Social => "Twitter",
        }
    }
}

/// One entry of the feed list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub id: String,
    pub name: String,
    /// Homepage of the publication.
    pub url: String,
    /// Feed endpoint that is actually fetched.
    pub feed: String,
    #[serde(default)]
    pub category: SourceCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Fetch this source without certificate verification. Reviewable per-source
    /// exception; there is no global equivalent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_invalid_certs: bool,
}

/// Externally maintained drop rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRuleSet {
    /// Case-insensitive regular expressions matched against the title.
    #[serde(default)]
    pub title_patterns: Vec<String>,
    /// Case-insensitive substrings looked up in the link.
    #[serde(default)]
    pub url_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputItem {
    pub title: String,
    pub link: String,
    pub source_id: String,
    pub source_name: String,
    pub category: SourceCategory,
    pub published_at: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub cluster_id: String,
    pub is_representative: bool,
}

/// Failure of one source, surfaced to whoever reads the output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    pub source_id: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub sources_total: usize,
    pub sources_failed: usize,
    pub items_parsed: usize,
    pub items_after_dedupe: usize,
    pub dropped_by_rule: usize,
    pub dropped_as_stale: usize,
    pub items_after_cap: usize,
    pub clusters: usize,
}

/// The canonical item file consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFile {
    pub run_id: String,
    pub generated_at: DateTime<FixedOffset>,
    /// Human readable description of the freshness window used for this run.
    pub freshness_window: String,
    pub items: Vec<OutputItem>,
    #[serde(default)]
    pub warnings: Vec<WarningRecord>,
    #[serde(default)]
    pub stats: RunStats,
}

/// Read-only view handed to the ranking step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub generated_at: DateTime<FixedOffset>,
    pub window_hours: i64,
    pub entries: Vec<RankingEntry>,
}

/// What the ranking step hands back. Keyed by the exact title it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStory {
    pub rank: u32,
    pub title: String,
    #[serde(default)]
    pub reason: String,
}

// Chat-platform channel reports. Produced by a separate scraper and merged
// with the item file only at render time.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDocument {
    pub title: String,
    #[serde(default)]
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub text: String,
    #[serde(default)]
    pub date: Option<String>,
    pub url: String,
    pub channel: String,
    #[serde(default)]
    pub documents: Vec<ChannelDocument>,
    #[serde(default)]
    pub views: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReportFile {
    pub generated_at: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub reports: Vec<ChannelReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_descriptor_defaults() {
        let raw = r#"{"id":"rbi","name":"RBI","url":"https://rbi.org.in","feed":"https://rbi.org.in/pressreleases_rss.xml"}"#;
        let descriptor: FeedDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.category, SourceCategory::PrimaryContent);
        assert!(!descriptor.allow_invalid_certs);
        assert!(descriptor.publisher.is_none());
    }

    #[test]
    fn category_uses_source_list_spelling() {
        let raw = r#"{"id":"yt","name":"YT","url":"u","feed":"f","category":"Videos"}"#;
        let descriptor: FeedDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.category, SourceCategory::Video);
        assert_eq!(serde_json::to_string(&SourceCategory::Social).unwrap(), "\"Twitter\"");
    }

    #[test]
    fn channel_report_file_tolerates_missing_lists() {
        let raw = r#"{"generated_at":"2026-02-02T05:00:00+00:00","reports":[{"text":"hi","url":"https://t.me/x/1","channel":"x"}]}"#;
        let file: ChannelReportFile = serde_json::from_str(raw).unwrap();
        assert!(file.warnings.is_empty());
        assert_eq!(file.reports.len(), 1);
        assert!(file.reports[0].documents.is_empty());
        assert!(file.reports[0].date.is_none());
    }
}
