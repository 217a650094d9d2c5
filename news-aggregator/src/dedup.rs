use crate::types::Item;
use std::collections::HashSet;
use tracing::{debug, info};

/// Canonical form of a link used as the dedupe key: trimmed, lowercased,
/// trailing slashes removed and a leading `http://` rewritten to `https://`.
/// Idempotent.
pub fn normalize_link(link: &str) -> String {
    let lowered = link.trim().to_lowercase();
    let trimmed = lowered.trim_end_matches(|c: char| c == '/' || c.is_whitespace());
    match trimmed.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => trimmed.to_string(),
    }
}

/// Keep the first item seen for every normalized link.
///
/// "First" means first in input order; the pipeline feeds sources in registry
/// order. It is not necessarily the most recently published copy.
pub fn deduplicate(items: Vec<Item>) -> Vec<Item> {
    let total = items.len();
    let mut seen = HashSet::with_capacity(total);
    let mut unique = Vec::with_capacity(total);

    for item in items {
        if seen.insert(item.normalized_link.clone()) {
            unique.push(item);
        } else {
            debug!("Removing duplicate entry: {} ({})", item.title, item.link);
        }
    }

    let removed = total - unique.len();
    if removed > 0 {
        info!("Removed {} duplicate entries", removed);
    }
    unique
}
