use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use dropkey_core::Config;
use dropkey_services::FileService;

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub inactivity_days: i64,
    pub interval: Duration,
}

impl CleanupConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.cleanup_enabled,
            inactivity_days: config.cleanup_inactivity_days,
            interval: Duration::from_secs(config.cleanup_interval_secs),
        }
    }
}

/// Recurring cleanup of files inactive beyond the threshold.
///
/// Holds no lock shared with live uploads or downloads; all coordination
/// goes through the record store's and ledger's own atomic contracts.
pub struct CleanupScheduler {
    shutdown_tx: mpsc::Sender<()>,
}

impl CleanupScheduler {
    /// Spawn the scheduler task. When cleanup is disabled the task is not
    /// spawned at all and shutdown is a no-op.
    pub fn start(service: Arc<FileService>, config: CleanupConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        if config.enabled {
            tokio::spawn(run_loop(service, config, shutdown_rx));
        } else {
            tracing::info!("File cleanup is disabled");
        }

        Self { shutdown_tx }
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn run_loop(
    service: Arc<FileService>,
    config: CleanupConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tracing::info!(
        inactivity_days = config.inactivity_days,
        interval_secs = config.interval.as_secs(),
        "Cleanup scheduler started"
    );

    let mut ticker = interval(config.interval);
    // A sweep that outlasts its period must not be followed by a burst of
    // catch-up sweeps.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; consume it so the first sweep
    // happens one full period after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Cleanup scheduler shutting down");
                break;
            }
            _ = ticker.tick() => {
                // Awaited inline: the next tick cannot start a second sweep
                // while this one is still running.
                match service.cleanup_sweep(config.inactivity_days).await {
                    Ok(stats) => {
                        tracing::info!(
                            examined = stats.examined,
                            deleted = stats.deleted,
                            failed = stats.failed,
                            "Cleanup sweep completed"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Cleanup sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{Duration as ChronoDuration, Utc};
    use uuid::Uuid;

    use dropkey_core::StorageBackend;
    use dropkey_db::db::memory::backdated;
    use dropkey_db::{FileRecordStore, MemoryFileRecordStore, MemoryQuotaLedger};
    use dropkey_services::TrafficLimits;
    use dropkey_storage::{ObjectStream, Storage, StorageError, StorageResult, StoredObject};

    #[derive(Clone, Default)]
    struct MapStorage {
        objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    #[async_trait]
    impl Storage for MapStorage {
        async fn save(&self, data: Vec<u8>, _content_type: &str) -> StorageResult<StoredObject> {
            let storage_key = Uuid::new_v4().to_string();
            let size = data.len() as u64;
            self.objects
                .lock()
                .unwrap()
                .insert(storage_key.clone(), data);
            Ok(StoredObject { storage_key, size })
        }

        async fn fetch(&self, storage_key: &str) -> StorageResult<ObjectStream> {
            let data = self
                .objects
                .lock()
                .unwrap()
                .get(storage_key)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))?;
            let size = data.len() as u64;
            let chunks: Vec<StorageResult<Bytes>> = vec![Ok(Bytes::from(data))];
            Ok(ObjectStream {
                stream: Box::pin(futures::stream::iter(chunks)),
                size,
            })
        }

        async fn delete(&self, storage_key: &str) -> StorageResult<()> {
            self.objects.lock().unwrap().remove(storage_key);
            Ok(())
        }

        async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
            Ok(self.objects.lock().unwrap().contains_key(storage_key))
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }
    }

    fn test_config(enabled: bool, period: Duration) -> CleanupConfig {
        CleanupConfig {
            enabled,
            inactivity_days: 30,
            interval: period,
        }
    }

    #[tokio::test]
    async fn scheduler_sweeps_inactive_files() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let files = Arc::new(MemoryFileRecordStore::new());
        let service = Arc::new(dropkey_services::FileService::new(
            files.clone(),
            Arc::new(MemoryQuotaLedger::new()),
            Arc::new(MapStorage::default()),
            TrafficLimits {
                max_upload_bytes: 524_288,
                max_download_bytes: 524_288,
            },
        ));

        let receipt = service
            .upload(b"old stuff".to_vec(), "old.txt", "text/plain", "10.0.0.5")
            .await
            .unwrap();
        let record = files
            .find_by_public_key(receipt.public_key)
            .await
            .unwrap()
            .unwrap();
        files
            .insert_record(backdated(record, Utc::now() - ChronoDuration::days(45)))
            .await;

        let scheduler =
            CleanupScheduler::start(service.clone(), test_config(true, Duration::from_millis(50)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.shutdown().await;

        assert!(files.is_empty().await, "inactive file should be swept");
    }

    #[tokio::test]
    async fn disabled_scheduler_never_sweeps() {
        let files = Arc::new(MemoryFileRecordStore::new());
        let service = Arc::new(dropkey_services::FileService::new(
            files.clone(),
            Arc::new(MemoryQuotaLedger::new()),
            Arc::new(MapStorage::default()),
            TrafficLimits {
                max_upload_bytes: 524_288,
                max_download_bytes: 524_288,
            },
        ));

        let receipt = service
            .upload(b"kept".to_vec(), "kept.txt", "text/plain", "10.0.0.5")
            .await
            .unwrap();
        let record = files
            .find_by_public_key(receipt.public_key)
            .await
            .unwrap()
            .unwrap();
        files
            .insert_record(backdated(record, Utc::now() - ChronoDuration::days(45)))
            .await;

        let scheduler =
            CleanupScheduler::start(service, test_config(false, Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown().await;

        assert_eq!(files.len().await, 1, "disabled cleanup must not delete anything");
    }
}
