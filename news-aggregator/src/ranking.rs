use crate::capper::newest_first;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use interfaces::defs::{OutputItem, RankedStory, RankingEntry, RankingSnapshot};
use std::collections::HashMap;
use tracing::{info, warn};

/// Items handed to the ranking step: everything published within the last
/// `window_hours` plus undated items, newest first, at most `max_items`.
pub fn ranking_snapshot(
    items: &[OutputItem],
    now: DateTime<Utc>,
    window_hours: i64,
    max_items: usize,
    zone: FixedOffset,
) -> RankingSnapshot {
    // None when the window reaches past the representable range: keep all
    let cutoff = Duration::try_hours(window_hours).and_then(|window| now.checked_sub_signed(window));

    let mut selected: Vec<&OutputItem> = items
        .iter()
        .filter(|item| match (item.published_at, cutoff) {
            (Some(at), Some(cutoff)) => at.with_timezone(&Utc) >= cutoff,
            (Some(_), None) | (None, _) => true,
        })
        .collect();
    selected.sort_by(|a, b| {
        newest_first(
            a.published_at.map(|at| at.with_timezone(&Utc)),
            b.published_at.map(|at| at.with_timezone(&Utc)),
        )
    });
    selected.truncate(max_items);

    info!("Ranking snapshot: {} items from the last {}h", selected.len(), window_hours);

    RankingSnapshot {
        generated_at: now.with_timezone(&zone),
        window_hours,
        entries: selected
            .into_iter()
            .map(|item| RankingEntry {
                title: item.title.clone(),
                link: item.link.clone(),
                source: item.source_name.clone(),
                published_at: item.published_at,
            })
            .collect(),
    }
}

/// A ranked story joined back to the item it names.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStory<'a> {
    pub rank: u32,
    pub reason: &'a str,
    pub title: &'a str,
    /// `None` when the ranking step returned a title the run never produced.
    pub item: Option<&'a OutputItem>,
}

/// Join ranked stories to output items by exact title. Rank and order are
/// taken as given.
pub fn resolve_ranking<'a>(items: &'a [OutputItem], ranked: &'a [RankedStory]) -> Vec<ResolvedStory<'a>> {
    let mut by_title: HashMap<&str, &OutputItem> = HashMap::with_capacity(items.len());
    for item in items {
        by_title.entry(item.title.as_str()).or_insert(item);
    }

    ranked
        .iter()
        .map(|story| {
            let item = by_title.get(story.title.as_str()).copied();
            if item.is_none() {
                warn!("Ranked title not found among items: {:?}", story.title);
            }
            ResolvedStory {
                rank: story.rank,
                reason: &story.reason,
                title: &story.title,
                item,
            }
        })
        .collect()
}
