//! Periodic location reloading on top of the freshness layer.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, instrument};

use crate::fleet::models::{UserId, VehicleLocation};
use crate::prelude::*;

/// Anything that can produce a user's current vehicle locations,
/// optionally bypassing its cache.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn locations(&self, user_id: UserId, force: bool) -> Result<Vec<VehicleLocation>>;
}

pub type LocationList = Arc<Vec<VehicleLocation>>;

pub struct LocationPoller<S> {
    source: Arc<S>,
    period: StdDuration,
}

impl<S: LocationSource + 'static> LocationPoller<S> {
    pub fn new(source: S, period: StdDuration) -> Self {
        Self {
            source: Arc::new(source),
            period,
        }
    }

    /// Starts polling the user's locations: one emission right away, then one
    /// per period. `force` is only honored on the first tick.
    ///
    /// Each call owns its own stream and cancellation, so independent
    /// consumers may poll concurrently. All subscribers of one handle share
    /// a single underlying fetch per tick.
    #[instrument(skip_all, fields(user_id = user_id, force = force))]
    pub fn poll(&self, user_id: UserId, force: bool) -> PollHandle {
        let (tx, rx) = watch::channel(None);
        let source = Arc::clone(&self.source);
        let period = self.period;
        let task = tokio::spawn(async move {
            let mut interval = interval(period);
            let mut force = force;
            loop {
                interval.tick().await;
                let locations = match source.locations(user_id, force).await {
                    Ok(locations) => locations,
                    Err(error) => {
                        error!(user_id, "failed to fetch the locations: {:#}", error);
                        Vec::new()
                    }
                };
                force = false;
                debug!(user_id, n_locations = locations.len(), "tick");
                if tx.send(Some(Arc::new(locations))).is_err() {
                    break;
                }
            }
        });
        PollHandle { receiver: rx, task }
    }
}

/// Owns one running poll stream. Dropping the handle cancels the stream.
pub struct PollHandle {
    receiver: watch::Receiver<Option<LocationList>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// A new subscriber immediately observes the latest emission, if any,
    /// and then every subsequent tick.
    pub fn subscribe(&self) -> watch::Receiver<Option<LocationList>> {
        self.receiver.clone()
    }

    /// Terminates the stream for all subscribers. Idempotent. An in-flight
    /// fetch completes on its own but its result is discarded.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
