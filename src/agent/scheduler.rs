//! Fixed-delay polling loop

use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::agent::report::CycleReport;

/// Something that can run one patch cycle
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CycleRunner: Send + Sync {
    /// Run one cycle. `shutdown` turns `true` when the agent should stop.
    async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport;
}

/// Runs cycles forever, waiting `interval` after each one finishes
pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Loop until `shutdown` turns `true` or its sender is dropped
    ///
    /// Returns the number of cycles started.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!("Patch agent started, checking every {:?}", self.interval);
        let mut cycle: u64 = 0;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            cycle += 1;
            let started = Instant::now();
            info!("Starting patch cycle #{}", cycle);

            let runner = Arc::clone(&self.runner);
            let receiver = shutdown.clone();
            match tokio::spawn(async move { runner.run_cycle(&receiver).await }).await {
                Ok(report) => info!(
                    "Patch cycle #{} completed in {:?}: {}",
                    cycle,
                    started.elapsed(),
                    report
                ),
                Err(e) => error!(
                    "Patch cycle #{} aborted after {:?}: {}",
                    cycle,
                    started.elapsed(),
                    e
                ),
            }

            debug!("Next patch cycle in {:?}", self.interval);
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed");
                        break;
                    }
                }
            }
        }

        info!("Patch agent stopped after {} cycle(s)", cycle);
        cycle
    }
}
