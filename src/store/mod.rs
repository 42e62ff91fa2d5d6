use std::future::Future;
use std::sync::Arc;

use serde::de::IgnoredAny;
use serde::Deserialize;
use snafu::ResultExt as _;
use tracing::instrument;

use crate::database::Database;
use crate::model::{now, ListingId, Timestamp, TrendingListing, ViewEvent};

pub use config::*;
pub use error::*;

mod config;
mod error;
pub mod global;
pub mod ranking;

#[derive(Debug, Deserialize)]
struct RecencyRow {
    viewed_at: Timestamp,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: usize,
}

/// Append-only log of listing views.
///
/// Cloning is cheap and every clone talks to the same database, so one store
/// can be shared by any number of concurrent writers and readers.
#[derive(Debug, Clone)]
pub struct ViewEventStore {
    database: Database,
    config: Arc<StoreConfig>,
}

impl ViewEventStore {
    /// Define the events table and its indexes, then hand out the store.
    #[instrument(skip(database))]
    pub async fn open(database: Database, config: StoreConfig) -> Result<Self> {
        let store = Self {
            database,
            config: Arc::new(config),
        };

        let schema = store.config.schema();
        store
            .run(async { store.database.query(schema).await?.check() })
            .await?;

        tracing::info!(table = store.config.table, "view event store is ready");
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// A store over a client that was never connected, every query fails.
    #[cfg(test)]
    pub(crate) fn disconnected() -> Self {
        Self::disconnected_with(StoreConfig::default())
    }

    #[cfg(test)]
    pub(crate) fn disconnected_with(config: StoreConfig) -> Self {
        Self {
            database: Database::init(),
            config: Arc::new(config),
        }
    }

    /// Run one storage round trip under the configured time budget.
    async fn run<T>(&self, query: impl Future<Output = surrealdb::Result<T>>) -> Result<T> {
        let budget = self.config.query_timeout;

        match tokio::time::timeout(budget, query).await {
            Ok(result) => result.context(StorageUnavailableSnafu),
            Err(_) => QueryTimeoutSnafu { budget }.fail(),
        }
    }

    /// Append one view of `listing_id`, stamped `occurred_at` or now.
    #[instrument(skip(self))]
    pub async fn record_view(
        &self, listing_id: &ListingId, occurred_at: Option<Timestamp>,
    ) -> Result<()> {
        let event = ViewEvent::at(listing_id.clone(), occurred_at.unwrap_or_else(now));
        self.insert(&event).await
    }

    /// Like [ViewEventStore::record_view] but validates a raw identifier first.
    pub async fn record_view_str(&self, listing_id: &str, occurred_at: Option<Timestamp>) -> Result<()> {
        let listing_id: ListingId = listing_id.parse().context(InvalidReferenceSnafu)?;
        self.record_view(&listing_id, occurred_at).await
    }

    pub(crate) async fn insert(&self, event: &ViewEvent) -> Result<()> {
        let statement = format!(
            "CREATE {} SET listing_id = $listing_id, viewed_at = $viewed_at",
            self.config.table
        );

        self.run(async {
            self.database
                .query(statement)
                .bind(("listing_id", event.listing_id.to_string()))
                .bind(("viewed_at", event.viewed_at.to_datetime()))
                .await?
                .check()
        })
        .await?;

        tracing::debug!(listing_id = %event.listing_id, viewed_at = %event.viewed_at, "recorded view");
        Ok(())
    }

    /// The `limit` most viewed listings in `[window_start, window_end)`.
    ///
    /// The database groups the window per listing, only one row per listing
    /// comes back. Rows are ordered by view count, then by their latest view,
    /// newest first.
    #[instrument(skip(self))]
    pub async fn rank_trending(
        &self, window_start: Timestamp, window_end: Timestamp, limit: usize,
    ) -> Result<Vec<TrendingListing>> {
        if limit == 0 || window_start >= window_end {
            return Ok(Vec::new());
        }

        let statement = format!(
            "SELECT listing_id, count() AS views, time::max(viewed_at) AS last_viewed_at FROM {} WHERE viewed_at >= $start AND viewed_at < $end GROUP BY listing_id",
            self.config.table,
        );

        let tallies: Vec<TrendingListing> = self
            .run(async {
                self.database
                    .query(statement)
                    .bind(("start", window_start.to_datetime()))
                    .bind(("end", window_end.to_datetime()))
                    .await?
                    .take(0)
            })
            .await?;

        let ranked = ranking::top(tallies, limit);
        tracing::debug!(listings = ranked.len(), "ranked trending listings");

        Ok(ranked)
    }

    /// When `listing_id` was last viewed, newest first, at most `limit` entries.
    #[instrument(skip(self))]
    pub async fn recent_events_for_listing(
        &self, listing_id: &ListingId, limit: usize,
    ) -> Result<Vec<Timestamp>> {
        let limit = limit.min(self.config.max_recent);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let statement = format!(
            "SELECT viewed_at FROM {} WHERE listing_id = $listing_id ORDER BY viewed_at {} LIMIT $limit",
            self.config.table,
            self.config.listing_recency_order(),
        );

        let rows: Vec<RecencyRow> = self
            .run(async {
                self.database
                    .query(statement)
                    .bind(("listing_id", listing_id.to_string()))
                    .bind(("limit", limit))
                    .await?
                    .take(0)
            })
            .await?;

        Ok(rows.into_iter().map(|row| row.viewed_at).collect())
    }

    /// Delete every event viewed before `cutoff` and return how many went.
    #[instrument(skip(self))]
    pub async fn prune_before(&self, cutoff: Timestamp) -> Result<usize> {
        let statement = format!(
            "DELETE {} WHERE viewed_at < $cutoff RETURN BEFORE",
            self.config.table
        );

        let removed: Vec<IgnoredAny> = self
            .run(async {
                self.database
                    .query(statement)
                    .bind(("cutoff", cutoff.to_datetime()))
                    .await?
                    .take(0)
            })
            .await?;

        tracing::info!(%cutoff, removed = removed.len(), "pruned view events");
        Ok(removed.len())
    }

    pub async fn count_events(&self) -> Result<usize> {
        let statement = format!("SELECT count() AS total FROM {} GROUP ALL", self.config.table);

        let row: Option<CountRow> = self
            .run(async { self.database.query(statement).await?.take(0) })
            .await?;

        Ok(row.map_or(0, |row| row.total))
    }
}
