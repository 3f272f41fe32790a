use std::sync::Arc;
use std::time::Duration;

use sqlx::{Pool, Sqlite};

use crate::db::models::now_millis;
use crate::db::{EmailTokenRepository, FileRepository, RefreshTokenRepository};
use crate::error::AppError;
use crate::storage::BlobStore;

const BATCH_SIZE: i64 = 200;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub files_removed: u64,
    pub blob_failures: u64,
    pub refresh_tokens_removed: u64,
    pub email_tokens_removed: u64,
}

/// Reaps unattached files older than the grace window, plus expired tokens.
#[derive(Clone)]
pub struct Sweeper {
    db: Pool<Sqlite>,
    blobs: Arc<dyn BlobStore>,
    grace: chrono::Duration,
}

impl Sweeper {
    pub fn new(db: Pool<Sqlite>, blobs: Arc<dyn BlobStore>, grace: chrono::Duration) -> Self {
        Sweeper { db, blobs, grace }
    }

    /// One pass. A row is only removed while still unattached, so a file attached after
    /// it was listed survives; its blob goes after the row.
    pub async fn sweep_once(&self) -> Result<SweepReport, AppError> {
        let now = now_millis();
        let cutoff = now - self.grace.num_milliseconds();
        let mut report = SweepReport::default();

        loop {
            let orphans = FileRepository::find_orphans(&self.db, cutoff, BATCH_SIZE).await?;
            if orphans.is_empty() {
                break;
            }
            let mut progressed = false;
            for file in &orphans {
                if !FileRepository::delete_unattached(&self.db, file.id).await? {
                    continue;
                }
                progressed = true;
                report.files_removed += 1;
                if let Err(e) = self.blobs.delete(&file.path).await {
                    report.blob_failures += 1;
                    tracing::warn!(file_id = file.id, path = %file.path, "blob delete failed: {}", e);
                }
            }
            if !progressed || (orphans.len() as i64) < BATCH_SIZE {
                break;
            }
        }

        report.refresh_tokens_removed = RefreshTokenRepository::cleanup_expired(&self.db, now).await?;
        report.email_tokens_removed = EmailTokenRepository::cleanup_expired(&self.db, now).await?;

        if report != SweepReport::default() {
            tracing::info!(
                files = report.files_removed,
                blob_failures = report.blob_failures,
                refresh_tokens = report.refresh_tokens_removed,
                email_tokens = report.email_tokens_removed,
                "sweep finished"
            );
        }
        Ok(report)
    }

    /// Runs [`Sweeper::sweep_once`] every `interval` until the task is dropped.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                tracing::error!("sweep failed: {}", e);
            }
        }
    }
}
