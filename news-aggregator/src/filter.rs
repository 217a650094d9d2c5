use crate::config::FreshnessWindow;
use crate::types::{AggregatorError, FilterRuleSet, Item, SourceWarning};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

/// The rule that caused an item to be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedRule {
    Url { pattern: String },
    Title { pattern: String },
}

/// Source id used for warnings about the rule file rather than a feed.
pub const FILTER_RULES_SOURCE: &str = "filter-rules";

fn rejected_pattern(pattern: &str, reason: String) -> SourceWarning {
    let error = AggregatorError::InvalidPattern { pattern: pattern.to_string(), reason };
    SourceWarning::from_error(FILTER_RULES_SOURCE, &error)
}

/// A [`FilterRuleSet`] compiled once per run. Read-only afterwards.
#[derive(Debug)]
pub struct FilterEngine {
    title_patterns: Vec<(String, Regex)>,
    url_patterns: Vec<String>,
    rejected: Vec<SourceWarning>,
}

impl FilterEngine {
    pub fn compile(rules: &FilterRuleSet) -> Self {
        let mut rejected = Vec::new();

        let title_patterns = rules
            .title_patterns
            .iter()
            .filter_map(|pattern| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => Some((pattern.clone(), regex)),
                    Err(e) => {
                        warn!("Skipping invalid title pattern {:?}: {}", pattern, e);
                        rejected.push(rejected_pattern(pattern, e.to_string()));
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        let url_patterns = rules
            .url_patterns
            .iter()
            .filter_map(|pattern| {
                if pattern.trim().is_empty() {
                    warn!("Skipping empty URL pattern");
                    rejected.push(rejected_pattern(pattern, "empty pattern would match every link".to_string()));
                    None
                } else {
                    Some(pattern.to_lowercase())
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Compiled {} title patterns and {} URL patterns ({} rejected)",
            title_patterns.len(),
            url_patterns.len(),
            rejected.len()
        );

        Self { title_patterns, url_patterns, rejected }
    }

    /// One `invalid-rule` warning per pattern that was skipped.
    pub fn rejected(&self) -> &[SourceWarning] {
        &self.rejected
    }

    /// First rule that matches, or `None` to keep the item. URL rules are
    /// checked first since they are cheaper; the verdict does not depend on it.
    pub fn evaluate(&self, item: &Item) -> Option<MatchedRule> {
        let link = item.link.to_lowercase();
        if let Some(pattern) = self.url_patterns.iter().find(|p| link.contains(p.as_str())) {
            return Some(MatchedRule::Url { pattern: pattern.clone() });
        }

        self.title_patterns
            .iter()
            .find(|(_, regex)| regex.is_match(&item.title))
            .map(|(pattern, _)| MatchedRule::Title { pattern: pattern.clone() })
    }

    /// Every rule matching the item, for diagnostics.
    pub fn matching_rules(&self, item: &Item) -> Vec<MatchedRule> {
        let link = item.link.to_lowercase();
        let urls = self
            .url_patterns
            .iter()
            .filter(|p| link.contains(p.as_str()))
            .map(|p| MatchedRule::Url { pattern: p.clone() });
        let titles = self
            .title_patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(&item.title))
            .map(|(p, _)| MatchedRule::Title { pattern: p.clone() });
        urls.chain(titles).collect()
    }
}

/// True when the item has a date and that date lies before the window start.
/// The boundary itself is inside the window. Undated items are never stale.
pub fn is_stale(item: &Item, window: FreshnessWindow, now: DateTime<Utc>) -> bool {
    match item.published_at {
        // a window reaching past the representable range covers everything
        Some(published_at) => now
            .checked_sub_signed(window.as_duration())
            .is_some_and(|start| published_at < start),
        None => false,
    }
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Item>,
    pub dropped_by_rule: usize,
    pub dropped_as_stale: usize,
}

/// Run the rule set and the freshness window over `items`, keeping input order.
pub fn apply(items: Vec<Item>, engine: &FilterEngine, window: FreshnessWindow, now: DateTime<Utc>) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for item in items {
        if let Some(rule) = engine.evaluate(&item) {
            debug!("Filtered {:?} by {:?}", item.title, rule);
            outcome.dropped_by_rule += 1;
        } else if is_stale(&item, window, now) {
            debug!("Filtered {:?}: older than {}", item.title, window);
            outcome.dropped_as_stale += 1;
        } else {
            outcome.kept.push(item);
        }
    }

    info!(
        "After content filtering: {} ({} matched a rule, {} older than {})",
        outcome.kept.len(),
        outcome.dropped_by_rule,
        outcome.dropped_as_stale,
        window
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::normalize_link;
    use crate::types::{FailureKind, SourceCategory};
    use chrono::{Duration, TimeZone};

    fn item(title: &str, link: &str, published_at: Option<DateTime<Utc>>) -> Item {
        Item {
            title: title.to_string(),
            link: link.to_string(),
            normalized_link: normalize_link(link),
            published_at,
            summary: None,
            source_id: "src".to_string(),
            source_name: "Source".to_string(),
            category: SourceCategory::PrimaryContent,
        }
    }

    fn rules() -> FilterRuleSet {
        FilterRuleSet {
            title_patterns: vec![
                r"sensex (closes|ends|opens|gains|loses|falls|rises|at)".to_string(),
                r"stock\s*market\s*today".to_string(),
                r"\bbuy or sell\b".to_string(),
            ],
            url_patterns: vec!["/video".to_string(), "PRNewswire.com".to_string()],
        }
    }

    #[test]
    fn title_patterns_are_case_insensitive() {
        let engine = FilterEngine::compile(&rules());
        let hit = item("SENSEX CLOSES flat amid weak cues", "https://x.com/markets/1", None);
        assert_eq!(
            engine.evaluate(&hit),
            Some(MatchedRule::Title { pattern: rules().title_patterns[0].clone() })
        );
        let miss = item("Infosys wins large deal", "https://x.com/companies/2", None);
        assert_eq!(engine.evaluate(&miss), None);
    }

    #[test]
    fn url_patterns_are_substrings() {
        let engine = FilterEngine::compile(&rules());
        let hit = item("Fed holds rates", "https://www.prnewswire.com/news/1", None);
        assert_eq!(engine.evaluate(&hit), Some(MatchedRule::Url { pattern: "prnewswire.com".to_string() }));
        let video = item("Budget explained", "https://x.com/VIDEOS/budget", None);
        assert!(engine.evaluate(&video).is_some());
    }

    #[test]
    fn first_match_agrees_with_full_evaluation() {
        let engine = FilterEngine::compile(&rules());
        let samples = [
            item("Stock market today: Sensex closes higher", "https://x.com/video/1", None),
            item("Stock market today: buy or sell?", "https://x.com/a", None),
            item("Sensex gains 300 points", "https://x.com/b", None),
            item("GDP grows 7.2%", "https://x.com/c", None),
        ];
        for sample in &samples {
            let all = engine.matching_rules(sample);
            let first = engine.evaluate(sample);
            assert_eq!(first.is_some(), !all.is_empty());
            if let Some(rule) = first {
                assert_eq!(rule, all[0]);
            }
        }
        // several rules at once still drop exactly once
        assert!(engine.matching_rules(&samples[0]).len() >= 3);
    }

    #[test]
    fn invalid_patterns_are_reported_not_fatal() {
        let engine = FilterEngine::compile(&FilterRuleSet {
            title_patterns: vec!["(unclosed".to_string(), "ipo.*gmp".to_string()],
            url_patterns: vec!["".to_string()],
        });
        assert_eq!(engine.rejected().len(), 2);
        for warning in engine.rejected() {
            assert_eq!(warning.source_id, FILTER_RULES_SOURCE);
            assert_eq!(warning.kind, FailureKind::InvalidRule);
        }
        assert!(engine.rejected()[0].message.contains("\"(unclosed\""));
        assert!(engine.evaluate(&item("IPO GMP today", "https://x.com", None)).is_some());
        assert!(engine.evaluate(&item("Anything else", "https://x.com", None)).is_none());
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let window = FreshnessWindow::days(5);

        let at_boundary = item("a", "https://a", Some(now - Duration::days(5)));
        let just_older = item("b", "https://b", Some(now - Duration::days(5) - Duration::seconds(1)));
        let fresh = item("c", "https://c", Some(now - Duration::hours(1)));
        let undated = item("d", "https://d", None);

        assert!(!is_stale(&at_boundary, window, now));
        assert!(is_stale(&just_older, window, now));
        assert!(!is_stale(&fresh, window, now));
        assert!(!is_stale(&undated, window, now));
    }

    #[test]
    fn oversized_window_keeps_everything() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let ancient = item("a", "https://a", Some(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()));
        assert!(!is_stale(&ancient, FreshnessWindow::days(u32::MAX), now));
    }

    #[test]
    fn apply_counts_each_drop_once() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let engine = FilterEngine::compile(&rules());
        let items = vec![
            item("Sensex closes flat", "https://x.com/1", Some(now - Duration::days(30))),
            item("Old story", "https://x.com/2", Some(now - Duration::days(30))),
            item("New story", "https://x.com/3", Some(now)),
            item("Undated story", "https://x.com/4", None),
        ];
        let outcome = apply(items, &engine, FreshnessWindow::days(5), now);
        assert_eq!(outcome.dropped_by_rule, 1);
        assert_eq!(outcome.dropped_as_stale, 1);
        let titles: Vec<_> = outcome.kept.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["New story", "Undated story"]);
    }
}
