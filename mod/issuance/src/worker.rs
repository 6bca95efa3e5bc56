use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::service::IssuanceService;

/// Configuration for the generation worker pool and its watchdog.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent generation workers.
    pub workers: usize,
    /// Polling fallback interval (seconds) — claims missed wakeups.
    pub poll_interval: u64,
    /// How often to scan for stuck PROCESSING batches (seconds).
    pub stuck_check_interval: u64,
    /// A batch in PROCESSING with no update for this many seconds is
    /// considered stuck (crashed mid-generation).
    pub stuck_threshold: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_interval: 5,
            stuck_check_interval: 60,
            stuck_threshold: 600,
        }
    }
}

/// Start the generation worker pool.
///
/// The batches table is the durable queue: workers claim the oldest
/// PENDING batch by compare-and-swap and drive it to a terminal state, so
/// a request accepted before a crash is picked up on restart and a
/// failure is always persisted on the batch row. The `Notify` wakeup is
/// an optimization; the polling fallback guarantees progress.
///
/// A watchdog flags batches stuck in PROCESSING (crash between claim and
/// completion). Detection only — recovery is an operational decision.
///
/// Returns a CancellationToken that stops the pool when cancelled.
pub fn start(service: Arc<IssuanceService>, config: WorkerConfig) -> CancellationToken {
    let cancel = CancellationToken::new();

    for worker_id in 0..config.workers.max(1) {
        let service = Arc::clone(&service);
        let cancel = cancel.clone();
        let interval = Duration::from_secs(config.poll_interval);

        tokio::spawn(async move {
            info!("generation worker {worker_id} started (poll={interval:?})");
            let notify = service.notify();
            loop {
                // Drain everything claimable before sleeping.
                loop {
                    match service.claim_and_generate() {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => {
                            error!("generation worker {worker_id}: claim failed: {e}");
                            break;
                        }
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("generation worker {worker_id} stopped");
                        break;
                    }
                    _ = notify.notified() => {
                        debug!("generation worker {worker_id} woken");
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });
    }

    // --- Stuck-PROCESSING watchdog ---
    {
        let service = Arc::clone(&service);
        let cancel = cancel.clone();
        let interval = Duration::from_secs(config.stuck_check_interval);
        let threshold = config.stuck_threshold;

        tokio::spawn(async move {
            info!("batch watchdog started (interval={interval:?}, threshold={threshold}s)");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("batch watchdog stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let cutoff = (chrono::Utc::now()
                            - chrono::Duration::seconds(threshold))
                        .to_rfc3339();
                        match service.stale_processing(&cutoff) {
                            Ok(stuck) if stuck.is_empty() => {}
                            Ok(stuck) => {
                                for batch in stuck {
                                    warn!(
                                        batch = %batch.code,
                                        since = %batch.update_at,
                                        "batch stuck in PROCESSING"
                                    );
                                }
                            }
                            Err(e) => error!("batch watchdog error: {e}"),
                        }
                    }
                }
            }
        });
    }

    cancel
}
