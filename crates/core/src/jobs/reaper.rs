//! Background removal of registry entries nobody will consume.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::JobRegistry;
use crate::metrics::JOBS_REAPED;

/// Spawns the stale job reaper.
///
/// Every `interval` it removes terminal jobs that have gone unobserved for
/// longer than `unobserved_ttl`, and any job older than `max_age`. Runs until
/// `shutdown` is cancelled.
pub fn spawn_reaper(
    registry: Arc<JobRegistry>,
    interval: Duration,
    unobserved_ttl: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Job reaper started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Job reaper received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let reaped = registry.purge_stale(Utc::now(), unobserved_ttl, max_age);
                    if reaped.is_empty() {
                        debug!(remaining = registry.len(), "Reaper sweep found nothing");
                    } else {
                        JOBS_REAPED.inc_by(reaped.len() as u64);
                        info!(
                            reaped = reaped.len(),
                            remaining = registry.len(),
                            "Removed stale jobs"
                        );
                    }
                }
            }
        }
        info!("Job reaper stopped");
    })
}
