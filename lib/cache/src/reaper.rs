//! Background eviction of sessions the platform never came back for.

use crate::cache::SessionCache;
use crate::config::CacheConfig;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Periodic sweeper over a [`SessionCache`].
pub struct Reaper;

impl Reaper {
    /// Starts the sweep loop on the current tokio runtime.
    ///
    /// Returns `None` without spawning anything when reaping is disabled.
    pub fn spawn<B>(cache: Arc<SessionCache<B>>, config: &CacheConfig) -> Option<ReaperHandle>
    where
        B: Send + Sync + 'static,
    {
        if !config.reap_enabled {
            info!("session cache reaper disabled");
            return None;
        }

        let max_age = config.max_age();
        let period = config.reap_interval();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so a fresh
            // process does not sweep an empty cache.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.remove_older_than(max_age, Utc::now());
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "reaped expired sessions");
                        }
                    }
                    // Fires on the stop signal and when the handle is dropped.
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("session cache reaper stopped");
        });

        info!(
            interval_seconds = period.as_secs(),
            max_age_seconds = max_age.num_seconds(),
            "session cache reaper started"
        );

        Some(ReaperHandle { shutdown_tx, task })
    }
}

/// Handle to a running reaper.
#[derive(Debug)]
pub struct ReaperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signals the loop to exit and waits for it.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "session cache reaper task ended abnormally");
        }
    }
}
