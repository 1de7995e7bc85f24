//! Sweep runner: main loop that reclaims abandoned uploads on an interval.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use quill_core::config::WorkerConfig;
use quill_service::StaleUploadSweeper;

/// Runs [`StaleUploadSweeper`] every `interval` until cancelled.
#[derive(Debug)]
pub struct SweepRunner {
    /// The sweeper to run
    sweeper: StaleUploadSweeper,
    /// Delay between sweeps
    interval: Duration,
}

impl SweepRunner {
    /// Create a new sweep runner
    pub fn new(sweeper: StaleUploadSweeper, interval: Duration) -> Self {
        Self { sweeper, interval }
    }

    /// Create a runner using the worker configuration
    pub fn from_config(sweeper: StaleUploadSweeper, config: &WorkerConfig) -> Self {
        Self::new(sweeper, Duration::from_secs(config.sweep_interval_seconds.max(1)))
    }

    /// Start the loop. The first sweep runs immediately. Returns once the
    /// cancel signal turns `true`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Upload sweeper started"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Upload sweeper received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!("Upload sweeper shut down complete");
    }

    /// Run one sweep, logging instead of returning failures.
    async fn tick(&self) {
        if let Err(e) = self.sweeper.sweep(Utc::now()).await {
            tracing::error!(error = %e, "Upload sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use quill_database::MemoryUploadLedger;
    use quill_storage::LocalStorageProvider;
    use quill_storage::chunked::ChunkStore;

    use super::*;

    #[tokio::test]
    async fn test_runs_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        let store = ChunkStore::new(Arc::new(provider));
        store.put_chunk("orphan", 0, Bytes::from("x")).await.unwrap();

        let sweeper = StaleUploadSweeper::new(
            Arc::new(MemoryUploadLedger::new()),
            store,
            chrono::Duration::hours(24),
        );
        let runner = SweepRunner::new(sweeper, Duration::from_millis(20));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { runner.run(rx).await });
        time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runner did not stop")
            .unwrap();
        assert!(!dir.path().join("chunks/orphan").exists());
    }

    #[tokio::test]
    async fn test_from_config_clamps_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        let sweeper = StaleUploadSweeper::new(
            Arc::new(MemoryUploadLedger::new()),
            ChunkStore::new(Arc::new(provider)),
            chrono::Duration::hours(1),
        );
        let config = WorkerConfig {
            enabled: true,
            sweep_interval_seconds: 0,
        };
        let runner = SweepRunner::from_config(sweeper, &config);
        assert_eq!(runner.interval, Duration::from_secs(1));
    }
}
