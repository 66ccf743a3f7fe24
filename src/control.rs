//! `ControlLoop`: composes the other components into the continuous main
//! loop.
//!
//! Grounded on `original_source/barn-agent/src/barn-agent.cpp`
//! (`barn_agent_main` and its `handle_success_in_ship_round` /
//! `handle_failure_in_sync_round` / `handle_failure_in_ship_round`
//! helpers).

use std::time::Duration;

use crate::directory;
use crate::metrics::MetricsClient;
use crate::selector::ChannelSelector;
use crate::ship::Shipper;
use crate::transfer::Transferer;
use crate::watcher;

pub struct ControlLoop {
    selector: Box<dyn ChannelSelector>,
    transferer: Transferer,
    shipper: Shipper,
    metrics: MetricsClient,
    sleep_seconds: u64,
}

impl ControlLoop {
    pub fn new(
        selector: Box<dyn ChannelSelector>,
        transferer: Transferer,
        metrics: MetricsClient,
        sleep_seconds: u64,
    ) -> Self {
        Self {
            selector,
            shipper: Shipper::new(transferer.clone()),
            transferer,
            metrics,
            sleep_seconds,
        }
    }

    /// Runs forever.
    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }

    /// Runs exactly one round; `pub` so tests (and a potential
    /// bounded-iterations CLI flag) can drive it without `run`'s infinite
    /// loop.
    pub async fn run_once(&mut self) {
        let channel = self.selector.pick();
        self.selector.send_metrics(&self.metrics);
        self.metrics.send_defaults();

        let listing = match directory::list_log_directory(channel.source_dir()).await {
            Ok(listing) => listing,
            Err(err) => {
                tracing::error!("failed to list source directory: {err:#}");
                self.metrics.send("FailedToGetSyncList", 1);
                self.sleep().await;
                return;
            }
        };

        let probe = self
            .transferer
            .probe(channel.source_dir(), &listing, &channel.target_uri)
            .await;
        let missing_on_target = match probe {
            Ok(missing) => missing,
            Err(err) => {
                tracing::error!("syncing error: {err}");
                self.metrics.send("FailedToGetSyncList", 1);
                self.sleep().await;
                return;
            }
        };

        let outcome = self
            .shipper
            .ship(&channel, &listing, &missing_on_target, &self.metrics)
            .await;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!("shipment error: {err}");
                self.sleep().await;
                return;
            }
        };

        if outcome.num_shipped > 0 {
            self.sleep().await;
            self.selector.heartbeat();
            return;
        }

        // No candidates existed: healthy idle, wait for a change.
        watcher::wait_for_new_file(channel.source_dir(), self.sleep_seconds).await;
        self.selector.heartbeat();
    }

    async fn sleep(&self) {
        if self.sleep_seconds > 0 {
            tokio::time::sleep(Duration::from_secs(self.sleep_seconds)).await;
        }
    }
}
