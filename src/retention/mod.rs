//! Photo retention: reclaim storage for photos older than the retention
//! window.
//!
//! The purge runs in two phases. Remote objects are deleted first, and each
//! photo is stepped through `active -> pending -> remote_deleted` as it goes.
//! Rows are swept in one bulk delete afterwards, and only once their object
//! is confirmed gone. A photo whose remote delete failed stays `pending` and
//! is retried on the next run.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{RetentionConfig, DEFAULT_RETENTION_DAYS};
use crate::db::{Database, Photo};
use crate::error::{Error, Result};
use crate::storage::ObjectStore;

/// A remote delete that did not go through.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDelete {
    pub photo_id: i64,
    pub file_key: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemotePurgeReport {
    pub attempted: usize,
    pub deleted: usize,
    pub failed: Vec<FailedDelete>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetentionReport {
    pub cutoff: Option<DateTime<Utc>>,
    pub selected: usize,
    pub remote: RemotePurgeReport,
    pub records_deleted: usize,
}

pub struct RetentionJob<'a, S: ObjectStore> {
    db: &'a Database,
    store: S,
    retention_period: Duration,
}

impl<'a, S: ObjectStore> RetentionJob<'a, S> {
    pub fn new(db: &'a Database, store: S) -> Self {
        Self {
            db,
            store,
            retention_period: Duration::days(DEFAULT_RETENTION_DAYS.into()),
        }
    }

    pub fn from_config(db: &'a Database, store: S, config: &RetentionConfig) -> Self {
        Self::new(db, store).with_retention_period(config.period())
    }

    pub fn with_retention_period(mut self, period: Duration) -> Self {
        self.retention_period = period;
        self
    }

    pub fn retention_period(&self) -> Duration {
        self.retention_period
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention_period
    }

    /// Photos created strictly before `now - retention_period`.
    pub fn select_expired_photos(&self, now: DateTime<Utc>) -> Result<Vec<Photo>> {
        self.db.photos_created_before(&self.cutoff(now))
    }

    /// Delete the stored object of every photo given, one call per photo,
    /// carrying on past failures.
    pub fn purge_remote_objects(&self, photos: &[Photo]) -> Result<RemotePurgeReport> {
        let ids: Vec<i64> = photos.iter().map(|p| p.id).collect();
        self.db.mark_pending_delete(&ids)?;

        let mut report = RemotePurgeReport::default();
        for photo in photos {
            report.attempted += 1;
            let key = photo.file_key.to_string();
            match self.store.delete(&key) {
                Ok(()) => match self.db.mark_remote_deleted(photo.id) {
                    Ok(()) => report.deleted += 1,
                    // Row removed since selection; nothing left to sweep.
                    Err(Error::NotFound { .. }) => {
                        debug!(photo_id = photo.id, "Photo row already gone");
                        report.deleted += 1;
                    }
                    Err(e) => {
                        warn!(
                            photo_id = photo.id,
                            file_key = %key,
                            error = %e,
                            "Object deleted but purge state not recorded"
                        );
                        report.failed.push(FailedDelete {
                            photo_id: photo.id,
                            file_key: key,
                            error: e.to_string(),
                        });
                    }
                },
                Err(e) => {
                    warn!(
                        photo_id = photo.id,
                        file_key = %key,
                        backend = self.store.backend_name(),
                        error = %e,
                        "Failed to delete remote object"
                    );
                    report.failed.push(FailedDelete {
                        photo_id: photo.id,
                        file_key: key,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            attempted = report.attempted,
            deleted = report.deleted,
            failed = report.failed.len(),
            "Remote purge finished"
        );
        Ok(report)
    }

    /// Bulk delete of expired rows whose objects are already gone.
    pub fn purge_records(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = self.cutoff(now);
        let count = self.db.delete_purged_photos_created_before(&cutoff)?;
        info!(count, cutoff = %cutoff, "Deleted expired photo records");
        Ok(count)
    }

    /// Select, purge remote objects, then purge records.
    pub fn run(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
        let cutoff = self.cutoff(now);
        let photos = self.select_expired_photos(now)?;
        info!(count = photos.len(), cutoff = %cutoff, "Selected expired photos");

        let remote = self.purge_remote_objects(&photos)?;
        let records_deleted = self.purge_records(now)?;

        Ok(RetentionReport {
            cutoff: Some(cutoff),
            selected: photos.len(),
            remote,
            records_deleted,
        })
    }

    /// Delete remote objects for photos expired as of now.
    pub fn delete_remote_objects(&self) -> Result<RemotePurgeReport> {
        let photos = self.select_expired_photos(Utc::now())?;
        self.purge_remote_objects(&photos)
    }

    /// Delete photo records expired as of now.
    pub fn delete_expired_records(&self) -> Result<usize> {
        self.purge_records(Utc::now())
    }
}
