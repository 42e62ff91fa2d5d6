use snafu::ResultExt as _;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Sender};
use tokio::task::JoinHandle;

use crate::model::{now, ListingId, ViewEvent};
use crate::store::{InvalidReferenceSnafu, StoreError, ViewEventStore};

/// Fire-and-forget entry point for the page-view path.
///
/// Events are queued on a bounded channel and written by a background task.
/// A full queue drops the event, a failed write is logged; neither reaches the caller.
#[derive(Debug, Clone)]
pub struct ViewRecorder {
    tx: Sender<ViewEvent>,
}

/// The background writer behind a [ViewRecorder].
#[derive(Debug)]
pub struct RecorderTask {
    handle: JoinHandle<()>,
}

impl RecorderTask {
    /// Wait for queued events to be written. Resolves once every [ViewRecorder] clone is dropped.
    pub async fn finish(self) {
        if let Err(error) = self.handle.await {
            tracing::error!(%error, "view recorder task panicked");
        }
    }
}

impl ViewRecorder {
    pub fn spawn(store: ViewEventStore, capacity: usize) -> (ViewRecorder, RecorderTask) {
        let (tx, mut rx) = channel::<ViewEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(error) = store.insert(&event).await {
                    tracing::error!(%error, listing_id = %event.listing_id, viewed_at = %event.viewed_at, "failed to record view");
                }
            }

            tracing::debug!("view recorder drained");
        });

        (ViewRecorder { tx }, RecorderTask { handle })
    }

    /// Queue a view of the listing named by `listing_id`, stamped now.
    ///
    /// Only a malformed identifier is reported back.
    pub fn record(&self, listing_id: &str) -> Result<(), StoreError> {
        let listing_id: ListingId = listing_id.parse().context(InvalidReferenceSnafu)?;
        self.record_event(ViewEvent::at(listing_id, now()));
        Ok(())
    }

    pub fn record_event(&self, event: ViewEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(listing_id = %event.listing_id, "view queue is full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(listing_id = %event.listing_id, "view recorder has stopped, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::memory;
    use crate::model::Timestamp;
    use crate::store::StoreConfig;

    const LISTING: &str = "65f1a2b3c4d5e6f708192a3b";

    async fn store() -> ViewEventStore {
        ViewEventStore::open(memory().await, StoreConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn queued_views_are_written() {
        let store = store().await;
        let (recorder, task) = ViewRecorder::spawn(store.clone(), 16);

        for _ in 0..3 {
            recorder.record(LISTING).unwrap();
        }
        drop(recorder);
        task.finish().await;

        assert_eq!(store.count_events().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn malformed_reference_is_returned_to_the_caller() {
        let store = store().await;
        let (recorder, task) = ViewRecorder::spawn(store.clone(), 16);

        let err = recorder.record("../admin").unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference { .. }));

        drop(recorder);
        task.finish().await;
        assert_eq!(store.count_events().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let store = store().await;
        let (recorder, task) = ViewRecorder::spawn(store.clone(), 1);
        let listing: ListingId = LISTING.parse().unwrap();

        // the writer cannot run until this test yields, so only the first event fits
        recorder.record_event(ViewEvent::at(listing.clone(), Timestamp::from_millis(1)));
        recorder.record_event(ViewEvent::at(listing, Timestamp::from_millis(2)));

        drop(recorder);
        task.finish().await;
        assert_eq!(store.count_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn storage_failures_stay_in_the_background() {
        let (recorder, task) = ViewRecorder::spawn(ViewEventStore::disconnected(), 4);

        assert!(recorder.record(LISTING).is_ok());

        drop(recorder);
        task.finish().await;
    }
}
