//! Queries backing the photo retention job.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::photos::{row_to_photo, PHOTO_COLUMNS};
use super::{format_timestamp, Database, Photo, PurgeState};
use crate::error::{Error, Result};

impl Database {
    /// Photos whose `created_at` is strictly earlier than `cutoff`,
    /// regardless of purge state.
    pub fn photos_created_before(&self, cutoff: &DateTime<Utc>) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photos WHERE created_at < ? ORDER BY created_at, id",
            PHOTO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([format_timestamp(cutoff)], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    /// Flag photos as selected for purging. Photos already further along
    /// are left alone. Returns the number of rows that changed state.
    pub fn mark_pending_delete(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
        let sql = format!(
            "UPDATE photos SET purge_state = 'pending', updated_at = ? WHERE purge_state = 'active' AND id IN ({})",
            placeholders.join(", ")
        );
        let now = Self::now();
        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
        params.push(&now);
        params.extend(ids.iter().map(|id| id as &dyn rusqlite::ToSql));
        let count = self.conn.execute(&sql, params.as_slice())?;
        Ok(count)
    }

    /// Record that a photo's stored object is gone.
    pub fn mark_remote_deleted(&self, photo_id: i64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE photos SET purge_state = ?, updated_at = ? WHERE id = ?",
            params![PurgeState::RemoteDeleted.as_str(), Self::now(), photo_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Photo", photo_id));
        }
        Ok(())
    }

    /// Photos selected for purging whose rows still exist.
    pub fn pending_delete_photos(&self) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photos WHERE purge_state != 'active' ORDER BY created_at, id",
            PHOTO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    /// One bulk delete of expired rows whose objects are confirmed removed.
    pub fn delete_purged_photos_created_before(&self, cutoff: &DateTime<Utc>) -> Result<usize> {
        let count = self.conn.execute(
            "DELETE FROM photos WHERE created_at < ? AND purge_state = ?",
            params![format_timestamp(cutoff), PurgeState::RemoteDeleted.as_str()],
        )?;
        Ok(count)
    }
}
