use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::now;
use crate::store::ViewEventStore;

const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct Quit;

/// Periodically deletes view events older than the retention horizon.
#[derive(Debug)]
pub struct RetentionTask {
    tx: oneshot::Sender<Quit>,
    handle: JoinHandle<()>,
}

impl RetentionTask {
    /// Prune once immediately, then every `every`, keeping `horizon` worth of history.
    pub fn spawn(store: ViewEventStore, horizon: Duration, every: Duration) -> Self {
        let (tx, mut quit) = oneshot::channel();
        let every = every.max(MIN_PERIOD);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(?horizon, period = ?every, "started view retention");

            loop {
                tokio::select! {
                    _ = interval.tick() => prune(&store, horizon).await,
                    _ = &mut quit => break,
                }
            }

            tracing::info!("stopped view retention");
        });

        Self { tx, handle }
    }

    pub async fn shutdown(self) {
        let _ = self.tx.send(Quit);
        let _ = self.handle.await;
    }
}

async fn prune(store: &ViewEventStore, horizon: Duration) {
    let cutoff = chrono::Duration::from_std(horizon)
        .ok()
        .and_then(|horizon| now().inner().checked_sub_signed(horizon));

    // a horizon reaching past the representable range keeps everything
    let Some(cutoff) = cutoff else {
        return;
    };

    if let Err(error) = store.prune_before(cutoff.into()).await {
        tracing::warn!(%error, %cutoff, "could not prune view events");
    }
}
