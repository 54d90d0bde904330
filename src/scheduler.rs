//! Repeating collection loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::updater::{CycleError, Updater};

pub struct Scheduler {
    updater: Arc<Updater>,
    interval: Duration,
    error_cooldown: Duration,
}

impl Scheduler {
    pub fn new(updater: Arc<Updater>, interval: Duration, error_cooldown: Duration) -> Self {
        Self {
            updater,
            interval,
            error_cooldown,
        }
    }

    /// Run cycles until `shutdown` flips to true or its sender is dropped.
    ///
    /// Each cycle runs in its own task, so a panic inside it is reported as a
    /// [`CycleError`] and followed by the cooldown like any other failure.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting collection loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let updater = Arc::clone(&self.updater);
            let mut cycle = tokio::spawn(async move { updater.run_cycle().await });

            let outcome = tokio::select! {
                joined = &mut cycle => joined.unwrap_or_else(|e| Err(CycleError::Panicked(e.to_string()))),
                _ = shutdown.changed() => {
                    cycle.abort();
                    break;
                }
            };

            let pause = match outcome {
                Ok(()) => self.interval,
                Err(e) => {
                    error!(
                        error = %e,
                        cooldown_secs = self.error_cooldown.as_secs(),
                        "Collection cycle failed"
                    );
                    self.error_cooldown
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Collection loop stopped");
    }
}
