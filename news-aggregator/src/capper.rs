use crate::cluster::Cluster;
use crate::types::Item;
use chrono::{DateTime, FixedOffset, Utc};
use interfaces::defs::OutputItem;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

/// Newest first, undated last. Equal keys keep their relative order.
pub fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_chronological(items: &mut [Item]) {
    items.sort_by(|a, b| newest_first(a.published_at, b.published_at));
}

/// Keep at most `max_per_source` items from each source, in input order.
/// Returns the kept items and how many were cut.
pub fn cap_per_source(items: Vec<Item>, max_per_source: usize) -> (Vec<Item>, usize) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0;

    let kept = items
        .into_iter()
        .filter(|item| {
            let count = seen.entry(item.source_id.clone()).or_insert(0);
            if *count < max_per_source {
                *count += 1;
                true
            } else {
                dropped += 1;
                false
            }
        })
        .collect::<Vec<_>>();

    for (source, count) in &seen {
        if *count == max_per_source {
            debug!("Source {} reached the cap of {}", source, max_per_source);
        }
    }
    info!("After per-source cap of {}: {} ({} cut)", max_per_source, kept.len(), dropped);
    (kept, dropped)
}

fn to_output(item: Item, cluster_id: &str, is_representative: bool, zone: FixedOffset) -> OutputItem {
    OutputItem {
        published_at: item.published_at.map(|at| at.with_timezone(&zone)),
        title: item.title,
        link: item.link,
        source_id: item.source_id,
        source_name: item.source_name,
        category: item.category,
        summary: item.summary,
        cluster_id: cluster_id.to_string(),
        is_representative,
    }
}

/// Flatten clusters into the final item sequence. Each representative is
/// followed by its related items, then the whole sequence is stably sorted
/// newest first.
pub fn finalize(clusters: Vec<Cluster>, zone: FixedOffset) -> Vec<OutputItem> {
    let mut output = Vec::with_capacity(clusters.iter().map(Cluster::member_count).sum());

    for cluster in clusters {
        let Cluster { id, representative, related } = cluster;
        output.push(to_output(representative, &id, true, zone));
        output.extend(related.into_iter().map(|item| to_output(item, &id, false, zone)));
    }

    output.sort_by(|a, b| {
        newest_first(
            a.published_at.map(|at| at.with_timezone(&Utc)),
            b.published_at.map(|at| at.with_timezone(&Utc)),
        )
    });
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::cluster;
    use crate::dedup::normalize_link;
    use crate::types::SourceCategory;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn item(title: &str, source: &str, published_at: Option<DateTime<Utc>>) -> Item {
        let link = format!("https://{source}.com/{}", title.replace(' ', "-"));
        Item {
            title: title.to_string(),
            normalized_link: normalize_link(&link),
            link,
            published_at,
            summary: None,
            source_id: source.to_string(),
            source_name: source.to_uppercase(),
            category: SourceCategory::PrimaryContent,
        }
    }

    #[test]
    fn chronological_sort_puts_undated_last_and_is_stable() {
        let t = |h| Some(Utc.with_ymd_and_hms(2026, 2, 2, h, 0, 0).unwrap());
        let mut items = vec![
            item("undated one", "a", None),
            item("older", "a", t(1)),
            item("tie first", "a", t(5)),
            item("undated two", "b", None),
            item("tie second", "b", t(5)),
            item("newest", "b", t(9)),
        ];
        sort_chronological(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["newest", "tie first", "tie second", "older", "undated one", "undated two"]);
    }

    #[test]
    fn cap_keeps_first_items_per_source() {
        let items: Vec<Item> = (0..5)
            .map(|i| item(&format!("a story {i}"), "a", None))
            .chain((0..2).map(|i| item(&format!("b story {i}"), "b", None)))
            .collect();
        let (kept, dropped) = cap_per_source(items, 3);
        assert_eq!(dropped, 2);
        assert_eq!(kept.iter().filter(|i| i.source_id == "a").count(), 3);
        assert_eq!(kept.iter().filter(|i| i.source_id == "b").count(), 2);
        assert_eq!(kept[2].title, "a story 2");
    }

    #[test]
    fn finalize_marks_representatives_and_shares_cluster_ids() {
        let noon = Utc.with_ymd_and_hms(2026, 2, 2, 6, 30, 0).unwrap();
        let morning = Utc.with_ymd_and_hms(2026, 2, 2, 4, 0, 0).unwrap();
        let items = vec![
            item("RBI raises repo rate by 25 bps", "a", Some(noon)),
            item("RBI hikes repo rate 25bps", "b", Some(morning)),
            item("Gold prices steady", "c", None),
        ];
        let output = finalize(cluster(items, 0.75, ist()), ist());

        assert_eq!(output.len(), 3);
        assert!(output[0].is_representative);
        assert!(!output[1].is_representative);
        assert_eq!(output[0].cluster_id, output[1].cluster_id);
        assert_ne!(output[0].cluster_id, output[2].cluster_id);
        assert!(output[2].published_at.is_none());
        assert_eq!(
            output[0].published_at.unwrap().to_rfc3339(),
            "2026-02-02T12:00:00+05:30"
        );
    }
}
