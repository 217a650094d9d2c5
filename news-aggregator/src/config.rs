use crate::types::{AggregatorError, Result};
use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const MAX_TIMEOUT_SECONDS: u64 = 3600;
pub const MAX_FEED_SIZE_MB: usize = 1024;
pub const MAX_FRESHNESS_DAYS: u32 = 3650;
pub const MAX_RANKING_WINDOW_HOURS: i64 = 24 * 3650;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Size of the fetch worker pool.
    pub workers: usize,
    pub max_feed_size_mb: usize,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Program used for the single retry after a 403. `None` disables the retry.
    pub fallback_command: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: 15,
            workers: 10,
            max_feed_size_mb: 10,
            follow_redirects: true,
            max_redirects: 5,
            fallback_command: Some("curl".to_string()),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AggregatorError::Config("fetch.workers must be at least 1".to_string()));
        }
        if !(1..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_seconds) {
            return Err(AggregatorError::Config(format!(
                "fetch.timeout_seconds must be within 1..={}, got {}",
                MAX_TIMEOUT_SECONDS, self.timeout_seconds
            )));
        }
        if !(1..=MAX_FEED_SIZE_MB).contains(&self.max_feed_size_mb) {
            return Err(AggregatorError::Config(format!(
                "fetch.max_feed_size_mb must be within 1..={}, got {}",
                MAX_FEED_SIZE_MB, self.max_feed_size_mb
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub freshness_days: u32,
    pub similarity_threshold: f64,
    pub max_items_per_source: usize,
    /// Offset east of UTC, in minutes, for zoneless timestamps and calendar days.
    pub reference_offset_minutes: i32,
    pub ranking_window_hours: i64,
    pub ranking_max_items: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            freshness_days: 5,
            similarity_threshold: 0.75,
            max_items_per_source: 50,
            reference_offset_minutes: 330,
            ranking_window_hours: 48,
            ranking_max_items: 200,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AggregatorError::Config(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            )));
        }
        if self.freshness_days > MAX_FRESHNESS_DAYS {
            return Err(AggregatorError::Config(format!(
                "freshness_days must be at most {}, got {}",
                MAX_FRESHNESS_DAYS, self.freshness_days
            )));
        }
        if !(0..=MAX_RANKING_WINDOW_HOURS).contains(&self.ranking_window_hours) {
            return Err(AggregatorError::Config(format!(
                "ranking_window_hours must be within 0..={}, got {}",
                MAX_RANKING_WINDOW_HOURS, self.ranking_window_hours
            )));
        }
        self.fetch.validate()?;
        self.reference_offset()?;
        Ok(())
    }

    pub fn reference_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.reference_offset_minutes * 60).ok_or_else(|| {
            AggregatorError::Config(format!(
                "reference_offset_minutes out of range: {}",
                self.reference_offset_minutes
            ))
        })
    }

    pub fn freshness_window(&self) -> FreshnessWindow {
        FreshnessWindow::days(self.freshness_days)
    }
}

/// Maximum age an item may have to be kept. Every description of the window
/// shown to a person goes through `Display`, so it cannot drift from the value
/// actually used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    days: u32,
}

impl FreshnessWindow {
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::days(i64::from(self.days))
    }
}

impl fmt::Display for FreshnessWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days == 1 {
            write!(f, "1 day")
        } else {
            write!(f, "{} days", self.days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"freshness_days": 10, "fetch": {"workers": 4}}"#).unwrap();
        assert_eq!(config.freshness_days, 10);
        assert_eq!(config.fetch.workers, 4);
        assert_eq!(config.fetch.timeout_seconds, 15);
        assert_eq!(config.max_items_per_source, 50);
        assert!((config.similarity_threshold - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn window_description_follows_value() {
        let config: PipelineConfig = serde_json::from_str(r#"{"freshness_days": 10}"#).unwrap();
        assert_eq!(config.freshness_window().to_string(), "10 days");
        assert_eq!(FreshnessWindow::days(1).to_string(), "1 day");
        assert_eq!(FreshnessWindow::days(5).as_duration(), Duration::days(5));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.fetch.workers = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.reference_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_values_past_their_ceiling() {
        let cases: [fn(&mut PipelineConfig); 6] = [
            |c| c.freshness_days = u32::MAX,
            |c| c.ranking_window_hours = i64::MAX,
            |c| c.ranking_window_hours = -1,
            |c| c.fetch.timeout_seconds = u64::MAX,
            |c| c.fetch.max_feed_size_mb = usize::MAX,
            |c| c.fetch.max_feed_size_mb = 0,
        ];
        for mutate in cases {
            let mut config = PipelineConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(AggregatorError::Config(_))),
                "accepted {config:?}"
            );
        }

        let mut config = PipelineConfig::default();
        config.freshness_days = MAX_FRESHNESS_DAYS;
        config.ranking_window_hours = MAX_RANKING_WINDOW_HOURS;
        config.fetch.timeout_seconds = MAX_TIMEOUT_SECONDS;
        config.fetch.max_feed_size_mb = MAX_FEED_SIZE_MB;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_values_fail_json_load() {
        let dir = std::env::temp_dir().join(format!("news-aggregator-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pipeline.json");
        std::fs::write(&path, r#"{"freshness_days": 4294967295}"#).unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(AggregatorError::Config(_))));
    }

    #[test]
    fn default_reference_zone_is_plus_0530() {
        let offset = PipelineConfig::default().reference_offset().unwrap();
        assert_eq!(offset.local_minus_utc(), 5 * 3600 + 30 * 60);
    }
}
