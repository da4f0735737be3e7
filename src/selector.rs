//! Picks the items a study session will walk through.
//!
//! An item is eligible when its card is due and *every* one of its tags is
//! in the active scope. That makes an empty scope select only untagged
//! items. This mirrors how the desktop app has always filtered; whether a
//! simple intersection would be the better product behavior is still an
//! open product question, so the subset rule is kept as is.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::models::StudyItem;

/// Whether a single item belongs in a session started at `now`.
pub fn is_eligible(item: &StudyItem, now: DateTime<Utc>, scope: &BTreeSet<String>) -> bool {
    item.is_due(now) && item.tags().is_subset(scope)
}

/// Indices of the eligible items, in collection order.
pub fn select_due(items: &[StudyItem], now: DateTime<Utc>, scope: &BTreeSet<String>) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| is_eligible(item, now, scope))
        .map(|(i, _)| i)
        .collect()
}

pub fn count_due(items: &[StudyItem], now: DateTime<Utc>, scope: &BTreeSet<String>) -> usize {
    items.iter().filter(|item| is_eligible(item, now, scope)).count()
}

/// Every tag used anywhere in the collection, sorted.
pub fn all_tags(items: &[StudyItem]) -> BTreeSet<String> {
    items.iter().flat_map(|item| item.tags().iter().cloned()).collect()
}
