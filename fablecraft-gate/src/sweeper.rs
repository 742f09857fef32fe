//! Cache Sweeper
//!
//! Periodic eviction of expired cache entries. Reads are already
//! lazily evicting; the sweep only reclaims memory for keys nobody
//! asks for again. Owned by the process lifecycle: spawned at startup
//! and stopped through the shutdown signal, never a detached
//! fire-and-forget.

use crate::gate::RequestGate;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Run the periodic cache sweep until `shutdown` signals true.
pub async fn cache_sweeper_task(
    gate: RequestGate,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Cache sweeper started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so startup isn't a sweep
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = gate.sweep_cache();
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted expired cache entries");
                } else {
                    tracing::debug!("Cache sweep found nothing expired");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("Cache sweeper stopped");
                    return;
                }
            }
        }
    }
}
