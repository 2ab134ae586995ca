//! Photos uploaded to a trip.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    format_timestamp, optional_timestamp_column, parse_timestamp, timestamp_column, Database,
};
use crate::error::{max_len, require, Error, Result};

const FILE_NAME_MAX: usize = 255;

pub(crate) const PHOTO_COLUMNS: &str = "id, file_key, file_name, trip_id, url, taken_at, \
     uploaded_by, is_sorted_yolo, purge_state, created_at, updated_at";

/// Where a photo stands in the retention purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurgeState {
    #[default]
    Active,
    /// Selected for purging; the stored object may still exist.
    Pending,
    /// Object removed from storage; the row is safe to delete.
    RemoteDeleted,
}

impl PurgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeState::Active => "active",
            PurgeState::Pending => "pending",
            PurgeState::RemoteDeleted => "remote_deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PurgeState::Active),
            "pending" => Some(PurgeState::Pending),
            "remote_deleted" => Some(PurgeState::RemoteDeleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: i64,
    /// Globally unique; names the object in the storage bucket.
    pub file_key: Uuid,
    pub file_name: String,
    pub trip_id: i64,
    pub url: String,
    pub taken_at: Option<DateTime<Utc>>,
    /// Cleared when the uploader's account is deleted.
    pub uploaded_by: Option<String>,
    pub is_sorted_yolo: bool,
    pub purge_state: PurgeState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Database::create_photo`].
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub file_key: Uuid,
    pub file_name: String,
    pub trip_id: i64,
    pub url: String,
    pub taken_at: Option<DateTime<Utc>>,
    pub uploaded_by: Option<String>,
}

impl NewPhoto {
    /// A photo with a freshly generated file key.
    pub fn new(trip_id: i64, url: impl Into<String>) -> Self {
        Self {
            file_key: Uuid::new_v4(),
            file_name: String::new(),
            trip_id,
            url: url.into(),
            taken_at: None,
            uploaded_by: None,
        }
    }

    pub fn file_key(mut self, key: Uuid) -> Self {
        self.file_key = key;
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn uploaded_by(mut self, user_id: impl Into<String>) -> Self {
        self.uploaded_by = Some(user_id.into());
        self
    }

    pub fn taken_at(mut self, ts: DateTime<Utc>) -> Self {
        self.taken_at = Some(ts);
        self
    }
}

pub(crate) fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    let key: String = row.get(1)?;
    let file_key = Uuid::parse_str(&key)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let state: String = row.get(8)?;
    let purge_state = PurgeState::parse(&state).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            Type::Text,
            format!("unknown purge state: {}", state).into(),
        )
    })?;

    Ok(Photo {
        id: row.get(0)?,
        file_key,
        file_name: row.get(2)?,
        trip_id: row.get(3)?,
        url: row.get(4)?,
        taken_at: optional_timestamp_column(row, 5)?,
        uploaded_by: row.get(6)?,
        is_sorted_yolo: row.get::<_, i32>(7)? != 0,
        purge_state,
        created_at: timestamp_column(row, 9)?,
        updated_at: timestamp_column(row, 10)?,
    })
}

impl Database {
    /// Record an uploaded photo. A repeated file key fails with a UNIQUE
    /// constraint error and leaves the existing row untouched.
    pub fn create_photo(&self, new_photo: &NewPhoto) -> Result<Photo> {
        max_len("Photo", "file_name", &new_photo.file_name, FILE_NAME_MAX)?;
        require("Photo", "url", &new_photo.url)?;

        let now = Self::now();
        let taken_at = new_photo.taken_at.as_ref().map(format_timestamp);
        self.conn.execute(
            r#"
            INSERT INTO photos (file_key, file_name, trip_id, url, taken_at, uploaded_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                new_photo.file_key.to_string(),
                new_photo.file_name,
                new_photo.trip_id,
                new_photo.url,
                taken_at,
                new_photo.uploaded_by,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(photo_id = id, file_key = %new_photo.file_key, "Created photo");

        let ts = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(Photo {
            id,
            file_key: new_photo.file_key,
            file_name: new_photo.file_name.clone(),
            trip_id: new_photo.trip_id,
            url: new_photo.url.clone(),
            // Round-trip through storage precision.
            taken_at: taken_at.as_deref().and_then(|t| parse_timestamp(t).ok()),
            uploaded_by: new_photo.uploaded_by.clone(),
            is_sorted_yolo: false,
            purge_state: PurgeState::Active,
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn get_photo(&self, photo_id: i64) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photos WHERE id = ?", PHOTO_COLUMNS);
        let photo = self.conn.query_row(&sql, [photo_id], row_to_photo).optional()?;
        Ok(photo)
    }

    pub fn get_photo_by_file_key(&self, file_key: &Uuid) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photos WHERE file_key = ?", PHOTO_COLUMNS);
        let photo = self
            .conn
            .query_row(&sql, [file_key.to_string()], row_to_photo)
            .optional()?;
        Ok(photo)
    }

    /// Photos of a trip ordered by capture time, then upload time.
    pub fn photos_for_trip(&self, trip_id: i64) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photos WHERE trip_id = ? ORDER BY COALESCE(taken_at, created_at), id",
            PHOTO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([trip_id], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn photos_uploaded_by(&self, user_id: &str) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photos WHERE uploaded_by = ? ORDER BY created_at, id",
            PHOTO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([user_id], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn set_photo_taken_at(&self, photo_id: i64, taken_at: Option<DateTime<Utc>>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE photos SET taken_at = ?, updated_at = ? WHERE id = ?",
            params![taken_at.as_ref().map(format_timestamp), Self::now(), photo_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Photo", photo_id));
        }
        Ok(())
    }

    /// Record that the object-detection sorter has processed this photo.
    pub fn mark_sorted_yolo(&self, photo_id: i64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE photos SET is_sorted_yolo = 1, updated_at = ? WHERE id = ?",
            params![Self::now(), photo_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Photo", photo_id));
        }
        Ok(())
    }

    /// Oldest photos still waiting for the object-detection sorter.
    pub fn unsorted_yolo_photos(&self, limit: usize) -> Result<Vec<Photo>> {
        let sql = format!(
            r#"
            SELECT {} FROM photos
            WHERE is_sorted_yolo = 0 AND purge_state = 'active'
            ORDER BY created_at, id
            LIMIT ?
            "#,
            PHOTO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([limit as i64], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn delete_photo(&self, photo_id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM photos WHERE id = ?", [photo_id])?;
        Ok(deleted > 0)
    }

    pub fn count_photos(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_db, seeded_trip};
    use chrono::TimeZone;

    #[test]
    fn test_purge_state_strings() {
        for state in [PurgeState::Active, PurgeState::Pending, PurgeState::RemoteDeleted] {
            assert_eq!(PurgeState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PurgeState::parse("gone"), None);
    }

    #[test]
    fn test_create_and_fetch_photo() {
        let db = memory_db();
        let (_, trip, user) = seeded_trip(&db);
        let taken = Utc.with_ymd_and_hms(2024, 7, 1, 12, 30, 0).unwrap();

        let photo = db
            .create_photo(
                &NewPhoto::new(trip.id, "https://cdn.example.com/a.jpg")
                    .file_name("a.jpg")
                    .uploaded_by(&user.id)
                    .taken_at(taken),
            )
            .unwrap();

        assert!(!photo.is_sorted_yolo);
        assert_eq!(photo.purge_state, PurgeState::Active);
        assert_eq!(photo.taken_at, Some(taken));

        let by_id = db.get_photo(photo.id).unwrap().unwrap();
        assert_eq!(by_id, photo);
        let by_key = db.get_photo_by_file_key(&photo.file_key).unwrap().unwrap();
        assert_eq!(by_key.id, photo.id);
    }

    #[test]
    fn test_duplicate_file_key_keeps_first() {
        let db = memory_db();
        let (_, trip, _) = seeded_trip(&db);
        let key = Uuid::new_v4();

        let first = db
            .create_photo(&NewPhoto::new(trip.id, "https://cdn/1").file_key(key))
            .unwrap();
        let err = db
            .create_photo(&NewPhoto::new(trip.id, "https://cdn/2").file_key(key))
            .unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(db.count_photos().unwrap(), 1);
        assert_eq!(db.get_photo_by_file_key(&key).unwrap().unwrap().id, first.id);
    }

    #[test]
    fn test_delete_trip_cascades_photos() {
        let db = memory_db();
        let (group, trip, _) = seeded_trip(&db);
        let other = db
            .create_trip(&crate::db::NewTrip::new(group.id, "Daegu"))
            .unwrap();
        db.create_photo(&NewPhoto::new(trip.id, "https://cdn/1")).unwrap();
        db.create_photo(&NewPhoto::new(trip.id, "https://cdn/2")).unwrap();
        let kept = db.create_photo(&NewPhoto::new(other.id, "https://cdn/3")).unwrap();

        assert!(db.delete_trip(trip.id).unwrap());
        assert!(db.photos_for_trip(trip.id).unwrap().is_empty());
        assert_eq!(db.count_photos().unwrap(), 1);
        assert!(db.get_photo(kept.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_uploader_nullifies_photo() {
        let db = memory_db();
        let (_, trip, user) = seeded_trip(&db);
        let photo = db
            .create_photo(&NewPhoto::new(trip.id, "https://cdn/1").uploaded_by(&user.id))
            .unwrap();
        assert_eq!(db.photos_uploaded_by(&user.id).unwrap().len(), 1);

        db.delete_user(&user.id).unwrap();

        let stored = db.get_photo(photo.id).unwrap().unwrap();
        assert_eq!(stored.uploaded_by, None);
        assert_eq!(stored.file_key, photo.file_key);
    }

    #[test]
    fn test_photo_rejects_unknown_trip_and_long_name() {
        let db = memory_db();
        let err = db.create_photo(&NewPhoto::new(77, "https://cdn/1")).unwrap_err();
        assert!(err.is_foreign_key_violation());

        let (_, trip, _) = seeded_trip(&db);
        let err = db
            .create_photo(&NewPhoto::new(trip.id, "https://cdn/1").file_name("x".repeat(256)))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_yolo_sorting_queue() {
        let db = memory_db();
        let (_, trip, _) = seeded_trip(&db);
        let a = db.create_photo(&NewPhoto::new(trip.id, "https://cdn/a")).unwrap();
        let b = db.create_photo(&NewPhoto::new(trip.id, "https://cdn/b")).unwrap();

        assert_eq!(db.unsorted_yolo_photos(10).unwrap().len(), 2);
        db.mark_sorted_yolo(a.id).unwrap();

        let queue = db.unsorted_yolo_photos(10).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, b.id);
        assert!(db.get_photo(a.id).unwrap().unwrap().is_sorted_yolo);
        assert!(db.mark_sorted_yolo(999).is_err());
    }

    #[test]
    fn test_set_taken_at_orders_trip_photos() {
        let db = memory_db();
        let (_, trip, _) = seeded_trip(&db);
        let first = db.create_photo(&NewPhoto::new(trip.id, "https://cdn/1")).unwrap();
        let second = db.create_photo(&NewPhoto::new(trip.id, "https://cdn/2")).unwrap();

        let early = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        db.set_photo_taken_at(second.id, Some(early)).unwrap();

        let ids: Vec<i64> = db.photos_for_trip(trip.id).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
