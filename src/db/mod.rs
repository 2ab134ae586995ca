mod schema;
pub mod groups;
pub mod photos;
pub mod retention;
pub mod tags;
pub mod trips;
pub mod users;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;

pub use schema::{MIGRATIONS, SCHEMA};
pub use groups::{Group, Membership};
pub use photos::{NewPhoto, Photo, PurgeState};
pub use tags::{TagFace, TagYolo};
pub use trips::{NewTrip, Trip, TripUpdate};
pub use users::{NewUser, User, UserUpdate};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Fixed-width UTC timestamp layout. Lexical order of stored values equals
/// chronological order, so range filters compare plain text.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(|dt| dt.and_utc())
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Read a timestamp column written by [`format_timestamp`].
pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

pub(crate) fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open (and create if needed) the SQLite database named in the config.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Self::open_path(&config.sqlite_path)
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// A private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Cascade and SET NULL rules are only enforced with this pragma on.
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations();
        Ok(())
    }

    fn run_migrations(&self) {
        for migration in MIGRATIONS {
            if let Err(e) = self.conn.execute(migration, []) {
                tracing::debug!(migration, error = %e, "Migration skipped");
            }
        }
    }

    /// Current time in storage format, used for created_at/updated_at.
    pub(crate) fn now() -> String {
        format_timestamp(&Utc::now())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn memory_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    /// A group, one trip in it and one uploader.
    pub fn seeded_trip(db: &Database) -> (Group, Trip, User) {
        let user = db
            .create_user(&NewUser::new("uploader", "Uploader", "up@example.com"))
            .unwrap();
        let group = db.create_group("Seoul crew").unwrap();
        let trip = db.create_trip(&NewTrip::new(group.id, "Busan")).unwrap();
        (group, trip, user)
    }

    pub fn backdate_photo(db: &Database, photo_id: i64, created_at: DateTime<Utc>) {
        db.conn
            .execute(
                "UPDATE photos SET created_at = ? WHERE id = ?",
                rusqlite::params![format_timestamp(&created_at), photo_id],
            )
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let fa = format_timestamp(&a);
        let fb = format_timestamp(&b);
        assert_eq!(fa, "2024-03-01T09:05:00.000000Z");
        assert_eq!(fa.len(), fb.len());
        assert!(fa < fb);
        assert_eq!(parse_timestamp(&fb).unwrap(), b);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();

        let fk: i64 = db
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_open_path_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trips.db");
        let db = Database::open_path(&path).unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
    }
}
