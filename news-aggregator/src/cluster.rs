use crate::types::Item;
use chrono::{FixedOffset, NaiveDate};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// A representative item and the items judged to report the same story.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: String,
    pub representative: Item,
    pub related: Vec<Item>,
}

impl Cluster {
    fn new(representative: Item) -> Self {
        Self {
            id: cluster_id(&representative),
            representative,
            related: Vec::new(),
        }
    }

    /// Representative plus related items.
    pub fn member_count(&self) -> usize {
        1 + self.related.len()
    }
}

/// Stable across runs for the same representative link.
pub fn cluster_id(representative: &Item) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, representative.normalized_link.as_bytes()).to_string()
}

/// Ratcliff/Obershelp similarity of two strings: twice the number of
/// characters in matching blocks over the total length. Two empty strings
/// are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(a, b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    // explicit stack instead of recursion; titles are short but feeds are not always polite
    let mut pending = vec![(0, a.len(), 0, b.len())];
    let mut matched = 0;

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        matched += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

/// Longest common block of `a[a_lo..a_hi]` and `b[b_lo..b_hi]`. Ties go to
/// the block starting earliest in `a`, then earliest in `b`.
fn longest_match(a: &[char], b: &[char], a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> (usize, usize, usize) {
    let mut best = (a_lo, b_lo, 0);
    let width = b_hi - b_lo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let k = j - b_lo + 1;
            curr[k] = if a[i] == b[j] { prev[k - 1] + 1 } else { 0 };
            let len = curr[k];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

struct Candidate {
    cluster: usize,
    title: Vec<char>,
}

/// Greedy single-pass clustering. Items are visited in input order; each one
/// joins the first same-day cluster whose representative title is similar
/// enough, otherwise it starts a new cluster. Undated items stay alone.
pub fn cluster(items: Vec<Item>, threshold: f64, zone: FixedOffset) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::with_capacity(items.len());
    let mut by_day: HashMap<NaiveDate, Vec<Candidate>> = HashMap::new();

    for item in items {
        let Some(published_at) = item.published_at else {
            clusters.push(Cluster::new(item));
            continue;
        };

        let day = published_at.with_timezone(&zone).date_naive();
        let title: Vec<char> = item.title.to_lowercase().chars().collect();
        let candidates = by_day.entry(day).or_default();

        let joined = candidates
            .iter()
            .find(|candidate| ratio_chars(&candidate.title, &title) >= threshold)
            .map(|candidate| candidate.cluster);

        match joined {
            Some(index) => {
                debug!(
                    "Clustered {:?} under {:?}",
                    item.title, clusters[index].representative.title
                );
                clusters[index].related.push(item);
            }
            None => {
                candidates.push(Candidate { cluster: clusters.len(), title });
                clusters.push(Cluster::new(item));
            }
        }
    }

    let grouped = clusters.iter().filter(|c| !c.related.is_empty()).count();
    info!("Formed {} clusters ({} with related items)", clusters.len(), grouped);
    clusters
}
