//! Drives a harvest strategy at a fixed cadence until shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::metrics::HarvestCounters;
use crate::scheduler::HarvestStrategy;

#[derive(Clone, Copy, Debug)]
pub struct DriverConfig {
    /// Pause between two cycles.
    pub pause: Duration,
    /// Log a counter snapshot every N cycles; 0 disables.
    pub stats_every: u64,
}

/// Calls `harvest()` repeatedly and returns the number of cycles run.
///
/// Shutdown is only observed between cycles; a running cycle (including its
/// cooldown) always completes.
pub async fn run_harvest_loop<S>(
    strategy: Arc<S>,
    cfg: DriverConfig,
    counters: HarvestCounters,
    mut shutdown: watch::Receiver<bool>,
) -> u64
where
    S: HarvestStrategy + ?Sized,
{
    info!(pause_ms = cfg.pause.as_millis() as u64, "harvest loop started");

    let mut cycles = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let outcome = strategy.harvest().await;
        cycles += 1;
        debug!(cycle = cycles, outcome = outcome.code(), "harvest cycle finished");

        if cfg.stats_every > 0 && cycles % cfg.stats_every == 0 {
            let totals = serde_json::to_string(&counters.snapshot()).unwrap_or_default();
            info!(cycles, totals = %totals, "harvest statistics");
        }

        tokio::select! {
            _ = tokio::time::sleep(cfg.pause) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can ask us to keep running.
                    break;
                }
            }
        }
    }

    info!(cycles, "harvest loop stopped");
    cycles
}
