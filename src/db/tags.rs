//! Object detection and face labels, shared between photos.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::photos::{row_to_photo, PHOTO_COLUMNS};
use super::{parse_timestamp, timestamp_column, Database, Photo};
use crate::error::{max_len, require, Error, Result};

const TAG_NAME_MAX: usize = 20;
const CUSTOM_NAME_MAX: usize = 255;

/// A label produced by the Yolo object detector, e.g. "dog" or "car".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagYolo {
    pub id: i64,
    pub tag_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A face cluster number from recognition, optionally named by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFace {
    pub id: i64,
    pub tag_num: i64,
    pub custom_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TagFace {
    /// The user's name for this face, or a numbered placeholder.
    pub fn display_name(&self) -> String {
        if self.custom_name.is_empty() {
            format!("Face {}", self.tag_num)
        } else {
            self.custom_name.clone()
        }
    }
}

fn row_to_yolo(row: &Row<'_>) -> rusqlite::Result<TagYolo> {
    Ok(TagYolo {
        id: row.get(0)?,
        tag_name: row.get(1)?,
        created_at: timestamp_column(row, 2)?,
        updated_at: timestamp_column(row, 3)?,
    })
}

fn row_to_face(row: &Row<'_>) -> rusqlite::Result<TagFace> {
    Ok(TagFace {
        id: row.get(0)?,
        tag_num: row.get(1)?,
        custom_name: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

impl Database {
    // ========================================================================
    // Yolo tags
    // ========================================================================

    /// Look up a detector label by name, creating it on first use.
    pub fn get_or_create_yolo_tag(&self, tag_name: &str) -> Result<TagYolo> {
        require("TagYolo", "tag_name", tag_name)?;
        max_len("TagYolo", "tag_name", tag_name, TAG_NAME_MAX)?;

        let existing = self
            .conn
            .query_row(
                "SELECT id, tag_name, created_at, updated_at FROM tag_yolo WHERE tag_name = ? ORDER BY id LIMIT 1",
                [tag_name],
                row_to_yolo,
            )
            .optional()?;
        if let Some(tag) = existing {
            return Ok(tag);
        }

        let now = Self::now();
        self.conn.execute(
            "INSERT INTO tag_yolo (tag_name, created_at, updated_at) VALUES (?, ?, ?)",
            params![tag_name, now, now],
        )?;
        let ts = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(TagYolo {
            id: self.conn.last_insert_rowid(),
            tag_name: tag_name.to_string(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn list_yolo_tags(&self) -> Result<Vec<TagYolo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, tag_name, created_at, updated_at FROM tag_yolo ORDER BY tag_name")?;
        let tags = stmt
            .query_map([], row_to_yolo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    pub fn delete_yolo_tag(&self, tag_id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM tag_yolo WHERE id = ?", [tag_id])?;
        Ok(deleted > 0)
    }

    pub fn add_yolo_tag_to_photo(&self, photo_id: i64, tag_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO photo_tag_yolo (photo_id, tag_id) VALUES (?, ?)",
            params![photo_id, tag_id],
        )?;
        Ok(())
    }

    pub fn remove_yolo_tag_from_photo(&self, photo_id: i64, tag_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM photo_tag_yolo WHERE photo_id = ? AND tag_id = ?",
            params![photo_id, tag_id],
        )?;
        Ok(())
    }

    pub fn yolo_tags_for_photo(&self, photo_id: i64) -> Result<Vec<TagYolo>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.id, t.tag_name, t.created_at, t.updated_at
            FROM tag_yolo t
            JOIN photo_tag_yolo pt ON pt.tag_id = t.id
            WHERE pt.photo_id = ?
            ORDER BY t.tag_name
            "#,
        )?;
        let tags = stmt
            .query_map([photo_id], row_to_yolo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    pub fn photos_with_yolo_tag(&self, tag_id: i64) -> Result<Vec<Photo>> {
        let sql = format!(
            r#"
            SELECT {} FROM photos
            WHERE id IN (SELECT photo_id FROM photo_tag_yolo WHERE tag_id = ?)
            ORDER BY created_at, id
            "#,
            PHOTO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([tag_id], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    // ========================================================================
    // Face tags
    // ========================================================================

    pub fn create_face_tag(&self, tag_num: i64, custom_name: Option<&str>) -> Result<TagFace> {
        let custom_name = custom_name.unwrap_or("");
        max_len("TagFace", "custom_name", custom_name, CUSTOM_NAME_MAX)?;

        let now = Self::now();
        self.conn.execute(
            "INSERT INTO tag_face (tag_num, custom_name, created_at, updated_at) VALUES (?, ?, ?, ?)",
            params![tag_num, custom_name, now, now],
        )?;
        let ts = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(TagFace {
            id: self.conn.last_insert_rowid(),
            tag_num,
            custom_name: custom_name.to_string(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn get_face_tag(&self, tag_id: i64) -> Result<Option<TagFace>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, tag_num, custom_name, created_at, updated_at FROM tag_face WHERE id = ?",
                [tag_id],
                row_to_face,
            )
            .optional()?;
        Ok(tag)
    }

    pub fn list_face_tags(&self) -> Result<Vec<TagFace>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tag_num, custom_name, created_at, updated_at FROM tag_face ORDER BY tag_num, id",
        )?;
        let tags = stmt
            .query_map([], row_to_face)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Give a face a human name. An empty name reverts to the numbered label.
    pub fn rename_face_tag(&self, tag_id: i64, custom_name: &str) -> Result<()> {
        max_len("TagFace", "custom_name", custom_name, CUSTOM_NAME_MAX)?;
        let changed = self.conn.execute(
            "UPDATE tag_face SET custom_name = ?, updated_at = ? WHERE id = ?",
            params![custom_name, Self::now(), tag_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("TagFace", tag_id));
        }
        Ok(())
    }

    pub fn delete_face_tag(&self, tag_id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM tag_face WHERE id = ?", [tag_id])?;
        Ok(deleted > 0)
    }

    pub fn add_face_tag_to_photo(&self, photo_id: i64, tag_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO photo_tag_face (photo_id, tag_id) VALUES (?, ?)",
            params![photo_id, tag_id],
        )?;
        Ok(())
    }

    pub fn remove_face_tag_from_photo(&self, photo_id: i64, tag_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM photo_tag_face WHERE photo_id = ? AND tag_id = ?",
            params![photo_id, tag_id],
        )?;
        Ok(())
    }

    pub fn face_tags_for_photo(&self, photo_id: i64) -> Result<Vec<TagFace>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.id, t.tag_num, t.custom_name, t.created_at, t.updated_at
            FROM tag_face t
            JOIN photo_tag_face pt ON pt.tag_id = t.id
            WHERE pt.photo_id = ?
            ORDER BY t.tag_num
            "#,
        )?;
        let tags = stmt
            .query_map([photo_id], row_to_face)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    pub fn photos_with_face_tag(&self, tag_id: i64) -> Result<Vec<Photo>> {
        let sql = format!(
            r#"
            SELECT {} FROM photos
            WHERE id IN (SELECT photo_id FROM photo_tag_face WHERE tag_id = ?)
            ORDER BY created_at, id
            "#,
            PHOTO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([tag_id], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }
}
