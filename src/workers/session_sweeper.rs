use crate::adapters::memory::MemorySessionStore;
use std::time::Duration;
use tracing::Instrument;

/// Reclaims expired entries from the in-process session store. Expired sessions
/// are already invisible to lookups; this only bounds memory.
#[derive(Debug)]
pub struct SessionSweeper {
    store: MemorySessionStore,
    sweep_interval_secs: u64,
}

impl SessionSweeper {
    #[must_use]
    pub const fn new(store: MemorySessionStore, sweep_interval_secs: u64) -> Self {
        Self { store, sweep_interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.sweep_interval_secs == 0 {
            tracing::info!("Session sweeping is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.sweep_interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    async { self.sweep(); }
                        .instrument(tracing::info_span!("run_session_sweep"))
                        .await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Session sweeper shutting down...");
    }

    /// Purges expired sessions once and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let purged = self.store.purge_expired();
        if purged > 0 {
            tracing::info!(count = purged, "Purged expired sessions");
        } else {
            tracing::debug!("No expired sessions to purge");
        }
        purged
    }
}
