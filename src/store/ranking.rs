use std::collections::HashMap;

use crate::model::{ListingId, Timestamp, TrendingListing};

#[derive(Debug, Clone, Copy)]
struct Tally {
    views: u64,
    last_viewed_at: Timestamp,
}

/// Count events per listing and keep the `limit` busiest.
///
/// Ordering: views descending, then latest view descending, then listing id
/// ascending so equal rows always come out the same way.
pub fn rank<I>(events: I, limit: usize) -> Vec<TrendingListing>
where
    I: IntoIterator<Item = (ListingId, Timestamp)>,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut tallies: HashMap<ListingId, Tally> = HashMap::new();

    for (listing_id, viewed_at) in events {
        tallies
            .entry(listing_id)
            .and_modify(|tally| {
                tally.views += 1;
                tally.last_viewed_at = tally.last_viewed_at.max(viewed_at);
            })
            .or_insert(Tally {
                views: 1,
                last_viewed_at: viewed_at,
            });
    }

    let tallies = tallies
        .into_iter()
        .map(|(listing_id, tally)| TrendingListing::new(listing_id, tally.views, tally.last_viewed_at))
        .collect();

    top(tallies, limit)
}

/// Order already counted listings and keep the first `limit`.
pub fn top(mut tallies: Vec<TrendingListing>, limit: usize) -> Vec<TrendingListing> {
    tallies.sort_unstable_by(|a, b| {
        b.views
            .cmp(&a.views)
            .then_with(|| b.last_viewed_at.cmp(&a.last_viewed_at))
            .then_with(|| a.listing_id.cmp(&b.listing_id))
    });
    tallies.truncate(limit);
    tallies
}
