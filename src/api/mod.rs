use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use snafu::ResultExt as _;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::config::humantime_duration;
use crate::model::{now, ListingId, Timestamp, TrendingListing};

mod error;
mod state;

pub use error::*;
pub use state::*;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

const DEFAULT_RECENT_LIMIT: usize = 20;

pub fn create_router(app: App) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trending", get(trending))
        .route("/listings/:listing_id/views", post(record_view).get(recent_views))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app)
}

async fn health() -> &'static str {
    "ok"
}

/// Views are telemetry: the caller always gets `202`, whatever happens to the event.
#[instrument(skip(app))]
async fn record_view(State(app): State<App>, Path(listing_id): Path<String>) -> StatusCode {
    if let Err(error) = app.recorder.record(&listing_id) {
        tracing::warn!(%error, "ignored a view of a malformed listing reference");
    }

    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentViews {
    pub listing_id: ListingId,
    pub viewed_at: Vec<Timestamp>,
}

#[instrument(skip(app))]
async fn recent_views(
    State(app): State<App>, Path(listing_id): Path<String>, Query(query): Query<RecentQuery>,
) -> Result<Json<RecentViews>> {
    let listing_id: ListingId = listing_id.parse().context(InvalidListingSnafu)?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);

    let viewed_at = app
        .store
        .recent_events_for_listing(&listing_id, limit)
        .await
        .context(StoreSnafu)?;

    Ok(Json(RecentViews {
        listing_id,
        viewed_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    /// How far back to count, e.g. `6h`.
    pub window: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendingResponse {
    pub listings: Vec<TrendingListing>,
    /// Set when the store could not answer and the list is empty as a fallback.
    pub degraded: bool,
}

#[instrument(skip(app))]
async fn trending(
    State(app): State<App>, Query(query): Query<TrendingQuery>,
) -> Result<Json<TrendingResponse>> {
    let window = match query.window {
        Some(text) => humantime_duration::parse(&text).context(InvalidWindowSnafu { text })?,
        None => app.trending.window,
    };
    let limit = query
        .limit
        .unwrap_or(app.trending.limit)
        .min(app.trending.max_limit);

    let window_end = now();
    let window_start = chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| window_end.inner().checked_sub_signed(window))
        .map_or_else(|| Timestamp::from_millis(0), Timestamp::from);

    let response = match app.store.rank_trending(window_start, window_end, limit).await {
        Ok(listings) => TrendingResponse {
            listings,
            degraded: false,
        },
        Err(error) => {
            tracing::error!(%error, "trending listings are unavailable, serving an empty list");
            TrendingResponse {
                listings: Vec::new(),
                degraded: true,
            }
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum_test::TestServer;

    use super::*;
    use crate::config::TrendingConfig;
    use crate::database::testing::{memory, stall};
    use crate::recorder::ViewRecorder;
    use crate::store::{StoreConfig, ViewEventStore};

    const A: &str = "65f1a2b3c4d5e6f708192a3b";
    const B: &str = "65f1a2b3c4d5e6f708192a3c";

    fn server(store: ViewEventStore) -> TestServer {
        let (recorder, _task) = ViewRecorder::spawn(store.clone(), 64);
        let app = App::new(store, recorder, TrendingConfig::default());
        TestServer::new(create_router(app)).unwrap()
    }

    async fn store() -> ViewEventStore {
        ViewEventStore::open(memory().await, StoreConfig::default())
            .await
            .unwrap()
    }

    async fn wait_for_events(store: &ViewEventStore, expected: usize) {
        for _ in 0..50 {
            if store.count_events().await.unwrap() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("recorder never wrote {expected} events");
    }

    #[tokio::test]
    async fn recorded_views_show_up_as_trending() {
        let store = store().await;
        let server = server(store.clone());

        for id in [A, A, A, B] {
            server
                .post(&format!("/listings/{id}/views"))
                .await
                .assert_status(StatusCode::ACCEPTED);
        }
        wait_for_events(&store, 4).await;

        let response = server.get("/trending").await;
        response.assert_status_ok();

        let trending = response.json::<TrendingResponse>();
        assert!(!trending.degraded);
        let counts: Vec<(String, u64)> = trending
            .listings
            .iter()
            .map(|row| (row.listing_id.to_string(), row.views))
            .collect();
        assert_eq!(counts, vec![(A.to_string(), 3), (B.to_string(), 1)]);
    }

    #[tokio::test]
    async fn trending_limit_is_applied() {
        let store = store().await;
        for id in [A, B] {
            store.record_view_str(id, None).await.unwrap();
        }
        let server = server(store);

        let response = server
            .get("/trending")
            .add_query_param("limit", 1)
            .add_query_param("window", "1h")
            .await;

        assert_eq!(response.json::<TrendingResponse>().listings.len(), 1);
    }

    #[tokio::test]
    async fn malformed_views_are_still_accepted() {
        let store = store().await;
        let server = server(store.clone());

        server
            .post("/listings/not-a-listing/views")
            .await
            .assert_status(StatusCode::ACCEPTED);

        assert_eq!(store.count_events().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recent_views_are_newest_first() {
        let store = store().await;
        let listing: ListingId = A.parse().unwrap();
        for millis in [1_000, 3_000, 2_000] {
            store
                .record_view(&listing, Some(Timestamp::from_millis(millis)))
                .await
                .unwrap();
        }
        let server = server(store);

        let response = server
            .get(&format!("/listings/{A}/views"))
            .add_query_param("limit", 2)
            .await;
        response.assert_status_ok();

        let recent = response.json::<RecentViews>();
        assert_eq!(recent.listing_id, listing);
        assert_eq!(
            recent.viewed_at,
            vec![Timestamp::from_millis(3_000), Timestamp::from_millis(2_000)]
        );
    }

    #[tokio::test]
    async fn bad_requests_are_rejected() {
        let server = server(store().await);

        server
            .get("/listings/nope/views")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get("/trending")
            .add_query_param("window", "yesterday-ish")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unavailable_storage_degrades_trending() {
        let server = server(ViewEventStore::disconnected());

        let response = server.get("/trending").await;
        response.assert_status_ok();

        let trending = response.json::<TrendingResponse>();
        assert!(trending.degraded);
        assert!(trending.listings.is_empty());

        server
            .get(&format!("/listings/{A}/views"))
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn slow_storage_degrades_trending() {
        let database = memory().await;
        let config = StoreConfig {
            query_timeout: Duration::from_millis(200),
            ..StoreConfig::default()
        };
        let store = ViewEventStore::open(database.clone(), config).await.unwrap();
        store.record_view_str(A, None).await.unwrap();
        let server = server(store);

        stall(&database, "5s").await;

        let response = server.get("/trending").await;
        response.assert_status_ok();

        let trending = response.json::<TrendingResponse>();
        assert!(trending.degraded);
        assert!(trending.listings.is_empty());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let server = server(store().await);
        server.get("/health").await.assert_text("ok");
    }
}
