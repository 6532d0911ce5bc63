use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tperiod_core::config::RefresherConfig;
use tperiod_core::Timestamp;
use tperiod_engine::{PeriodRegistry, UpdateOutcome};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SchedulerError};

/// Handle to a spawned [`Refresher`] loop.
pub struct RefresherHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal the loop to stop and wait for it to exit.
    ///
    /// Refreshes already dispatched to blocking tasks are not interrupted.
    pub async fn shutdown(self) -> Result<()> {
        // A send error means the loop is already gone; joining reports why.
        let _ = self.shutdown_tx.send(true);
        self.task.await?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Periodically purges and rolls forward every registered time period.
pub struct Refresher {
    registry: Arc<PeriodRegistry>,
    config: RefresherConfig,
}

impl Refresher {
    pub fn new(registry: Arc<PeriodRegistry>, config: RefresherConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        Ok(Self { registry, config })
    }

    /// Start the loop on the current Tokio runtime.
    ///
    /// Dropping the returned handle also stops the loop.
    pub fn spawn(self) -> RefresherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        RefresherHandle { shutdown_tx, task }
    }

    /// Main loop. Ticks every `interval_secs` until `shutdown` broadcasts `true`.
    ///
    /// The first tick fires immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval_secs,
            horizon_secs = self.config.horizon_secs,
            retention_secs = self.config.retention_secs,
            "time period refresher started"
        );

        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Refreshes run detached; the loop never waits on a policy.
                    let dispatched = self.tick(Utc::now());
                    debug!(periods = dispatched.len(), "refresher tick dispatched");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("time period refresher shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Dispatch one refresh per registered period.
    ///
    /// Each refresh runs on its own blocking task, supervised by an async task
    /// that logs a panic. Periods still busy with an earlier refresh are
    /// skipped. Returns the supervising handles keyed by period name.
    pub fn tick(&self, now: Timestamp) -> Vec<(String, JoinHandle<()>)> {
        let retention = self.config.retention();
        let horizon = self.config.horizon();
        let mut dispatched = Vec::new();

        for period in self.registry.periods() {
            let name = period.name().to_string();
            let Some(guard) = period.try_begin_refresh() else {
                warn!(period = %name, "previous refresh still running; skipping this tick");
                continue;
            };

            let worker_name = name.clone();
            // The guard moves into the task and releases the period when the
            // task returns or unwinds.
            let blocking = tokio::task::spawn_blocking(move || {
                match guard.period().refresh(now, retention, horizon) {
                    Ok(UpdateOutcome::Updated { begin, end, segments }) => {
                        debug!(
                            period = %worker_name,
                            %begin,
                            %end,
                            segments,
                            "time period refreshed"
                        );
                    }
                    Ok(UpdateOutcome::Skipped) => {
                        debug!(period = %worker_name, "time period already up to date");
                    }
                    // Already logged where the policy ran.
                    Err(e) if e.is_policy() => {}
                    Err(e) => {
                        warn!(
                            period = %worker_name,
                            error = %e,
                            code = e.code(),
                            "refresh failed; retrying on next tick"
                        );
                    }
                }
            });

            let supervisor_name = name.clone();
            let supervisor = tokio::spawn(async move {
                if let Err(e) = blocking.await {
                    error!(period = %supervisor_name, error = %e, "refresh task panicked");
                }
            });
            dispatched.push((name, supervisor));
        }

        dispatched
    }
}
