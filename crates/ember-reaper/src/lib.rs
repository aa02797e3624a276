//! Background reconciliation: orphaned upload-directory sweeps and
//! liveness heartbeats, run on fixed intervals with overlap prevention.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use ember_blob::{BlobRepository, PathManager};
use ember_index::IndexClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Tunables for the reaper's two jobs, mirroring the reference scheduler's
/// `job_defaults` (`coalesce=false`, `max_instances=1`,
/// `misfire_grace_time=300`) via the per-job mutex guard below: a tick that
/// fires while the previous run is still in flight is skipped rather than
/// queued.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub cleanup_interval: Duration,
    pub orphan_age: Duration,
    pub heartbeat_interval: Duration,
}

impl ReaperConfig {
    #[must_use]
    pub fn new(cleanup_interval_minutes: u64, orphan_age_minutes: u64) -> Self {
        Self {
            cleanup_interval: Duration::from_secs(cleanup_interval_minutes * 60),
            orphan_age: Duration::from_secs(orphan_age_minutes * 60),
            heartbeat_interval: Duration::from_secs(60),
        }
    }
}

/// Owns the two recurring jobs and the handles to stop them.
pub struct Reaper {
    index: IndexClient,
    paths: PathManager,
    repo: Arc<BlobRepository>,
    config: ReaperConfig,
    cleanup_lock: Arc<Mutex<()>>,
}

impl Reaper {
    #[must_use]
    pub fn new(index: IndexClient, paths: PathManager, repo: BlobRepository, config: ReaperConfig) -> Self {
        Self { index, paths, repo: Arc::new(repo), config, cleanup_lock: Arc::new(Mutex::new(())) }
    }

    /// Spawn both recurring jobs. Each runs on its own interval loop and
    /// keeps running until the handle is dropped or the task is aborted.
    pub fn spawn(self) -> ReaperHandles {
        let cleanup_interval = self.config.cleanup_interval;
        let heartbeat_interval = self.config.heartbeat_interval;

        let cleanup_self = Arc::new(self);
        let heartbeat_self = Arc::clone(&cleanup_self);

        let cleanup = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                ticker.tick().await;
                cleanup_self.run_cleanup_tick().await;
            }
        });

        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            loop {
                ticker.tick().await;
                heartbeat_self.run_heartbeat_tick().await;
            }
        });

        ReaperHandles { cleanup, heartbeat }
    }

    async fn run_cleanup_tick(&self) {
        let Ok(_guard) = self.cleanup_lock.try_lock() else {
            warn!("cleanup_orphaned_files_skipped_overlap");
            return;
        };
        if let Err(err) = self.cleanup_orphaned_files().await {
            error!(error = %err, "cleanup_job_failed");
        }
    }

    async fn run_heartbeat_tick(&self) {
        if let Err(err) = self.health_check_marker().await {
            error!(error = %err, "scheduler_heartbeat_failed");
        }
    }

    /// Walk the storage base directory and remove any upload folder whose
    /// index key is gone and whose age exceeds the configured grace window.
    #[instrument(skip(self))]
    pub async fn cleanup_orphaned_files(&self) -> Result<(), ReaperError> {
        info!("cleanup_orphaned_files_started");
        let started_at = Utc::now();

        let base = self.paths.base().to_path_buf();
        if !base.is_dir() {
            warn!("storage_path_not_found");
            return Ok(());
        }

        let orphan_age = self.config.orphan_age;
        let mut cleaned_count = 0u64;
        let mut entries = tokio::fs::read_dir(&base).await.map_err(ReaperError::Io)?;

        while let Some(entry) = entries.next_entry().await.map_err(ReaperError::Io)? {
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else { continue };
            if !file_type.is_dir() {
                continue;
            }
            let Some(identifier) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if identifier == "temp" {
                continue;
            }

            match self.reconcile_one(identifier, &path, orphan_age).await {
                Ok(true) => cleaned_count += 1,
                Ok(false) => {}
                Err(err) => error!(identifier, error = %err, "error_processing_folder"),
            }
        }

        let elapsed = (Utc::now() - started_at).num_milliseconds();
        info!(removed_count = cleaned_count, elapsed_ms = elapsed, "cleanup_completed");

        self.index
            .set_marker("health:last_cleanup", &started_at.to_rfc3339())
            .await
            .map_err(|e| ReaperError::Index(e.to_string()))?;
        Ok(())
    }

    async fn reconcile_one(
        &self,
        identifier: &str,
        path: &std::path::Path,
        orphan_age: Duration,
    ) -> Result<bool, ReaperError> {
        let exists = self.index.exists(identifier).await.map_err(|e| ReaperError::Index(e.to_string()))?;
        if exists {
            return Ok(false);
        }

        let metadata = tokio::fs::metadata(path).await.map_err(ReaperError::Io)?;
        let created: DateTime<Utc> = metadata.created().map_or_else(|_| Utc::now(), DateTime::from);
        let age = Utc::now().signed_duration_since(created);
        let age_minutes = age.num_seconds() as f64 / 60.0;

        if age.to_std().unwrap_or_default() <= orphan_age {
            return Ok(false);
        }

        info!(identifier, age_minutes = round1(age_minutes), "removing_orphaned_folder");
        self.repo.delete_directory(path).map_err(|e| ReaperError::Blob(e.to_string()))?;
        Ok(true)
    }

    /// Refresh the scheduler heartbeat marker.
    #[instrument(skip(self))]
    pub async fn health_check_marker(&self) -> Result<(), ReaperError> {
        self.index
            .set_marker("health:scheduler_heartbeat", &Utc::now().to_rfc3339())
            .await
            .map_err(|e| ReaperError::Index(e.to_string()))
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Handles to the two background tasks. Dropping or aborting stops the jobs.
pub struct ReaperHandles {
    pub cleanup: JoinHandle<()>,
    pub heartbeat: JoinHandle<()>,
}

impl ReaperHandles {
    pub fn abort(&self) {
        self.cleanup.abort();
        self.heartbeat.abort();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReaperError {
    #[error("filesystem error: {0}")]
    Io(#[source] std::io::Error),
    #[error("index error: {0}")]
    Index(String),
    #[error("blob repository error: {0}")]
    Blob(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_converts_minutes_to_durations() {
        let cfg = ReaperConfig::new(30, 60);
        assert_eq!(cfg.cleanup_interval, Duration::from_secs(1800));
        assert_eq!(cfg.orphan_age, Duration::from_secs(3600));
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(60));
    }

    #[test]
    fn round1_rounds_to_one_decimal() {
        assert!((round1(1.249) - 1.2).abs() < f64::EPSILON);
        assert!((round1(1.25) - 1.3).abs() < f64::EPSILON);
    }
}
