use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::{
    jwks::JwksClient,
    material::KeyError,
    store::{KeyStore, RotationSummary},
};

/// Minimum spacing between refreshes triggered by unknown key ids.
const ON_DEMAND_MIN_GAP: Duration = Duration::from_secs(10);

/// Keeps a `KeyStore` in sync with the issuer's published key set.
///
/// A failed refresh leaves the previous snapshot in place. A request that
/// arrives too soon after the last on-demand refresh is postponed, not dropped.
pub struct KeyRefresher {
    store: Arc<KeyStore>,
    client: JwksClient,
    interval: Duration,
    min_gap: Duration,
}

impl KeyRefresher {
    pub fn new(store: Arc<KeyStore>, client: JwksClient, interval: Duration) -> Self {
        Self {
            store,
            client,
            interval,
            min_gap: ON_DEMAND_MIN_GAP,
        }
    }

    #[cfg(test)]
    fn with_on_demand_gap(mut self, min_gap: Duration) -> Self {
        self.min_gap = min_gap;
        self
    }

    pub async fn refresh_once(&self) -> Result<RotationSummary, KeyError> {
        let keys = self.client.fetch().await?;
        let summary = self.store.replace(keys);
        info!(
            jwks_uri = %self.client.jwks_uri(),
            active = summary.active,
            added = summary.added,
            retired = summary.retired,
            dropped = summary.dropped,
            "verification keys refreshed"
        );
        Ok(summary)
    }

    /// Run the refresh loop on the tokio runtime until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; startup already did the initial fetch.
        ticker.tick().await;

        let mut last_on_demand: Option<Instant> = None;
        let mut pending = false;
        loop {
            let next_allowed =
                last_on_demand.map_or_else(Instant::now, |last| last + self.min_gap);
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.store.refresh_requested() => {
                    if let Some(last) = last_on_demand
                        && last.elapsed() < self.min_gap
                    {
                        debug!("key refresh requested too soon, postponing");
                        pending = true;
                        continue;
                    }
                    last_on_demand = Some(Instant::now());
                }
                _ = tokio::time::sleep_until(next_allowed), if pending => {
                    last_on_demand = Some(Instant::now());
                }
            }
            pending = false;

            if let Err(err) = self.refresh_once().await {
                warn!(error = %err, "key refresh failed, keeping previous key set");
            }
        }
    }
}
