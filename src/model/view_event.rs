use super::*;

/// One observed view or click of a listing.
///
/// The record id is assigned by the database on insert and never read back;
/// events are write-once so nothing needs to address a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEvent {
    pub listing_id: ListingId,
    pub viewed_at: Timestamp,
}

impl ViewEvent {
    pub fn at(listing_id: ListingId, viewed_at: Timestamp) -> Self {
        Self {
            listing_id,
            viewed_at,
        }
    }
}

/// A ranked row of the trending query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct TrendingListing {
    pub listing_id: ListingId,
    pub views: u64,
    pub last_viewed_at: Timestamp,
}
