//! Trips owned by a group.

use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{date_column, format_date, parse_timestamp, timestamp_column, Database};
use crate::error::{max_len, require, Error, Result};

const PLACE_MAX: usize = 50;

const TRIP_COLUMNS: &str =
    "id, group_id, place, departing_date, arriving_date, thumbnail, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub id: i64,
    pub group_id: i64,
    pub place: String,
    pub departing_date: NaiveDate,
    pub arriving_date: NaiveDate,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Database::create_trip`]. Missing dates default to today
/// in local time.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub group_id: i64,
    pub place: String,
    pub departing_date: Option<NaiveDate>,
    pub arriving_date: Option<NaiveDate>,
    pub thumbnail: Option<String>,
}

impl NewTrip {
    pub fn new(group_id: i64, place: impl Into<String>) -> Self {
        Self {
            group_id,
            place: place.into(),
            departing_date: None,
            arriving_date: None,
            thumbnail: None,
        }
    }

    pub fn dates(mut self, departing: NaiveDate, arriving: NaiveDate) -> Self {
        self.departing_date = Some(departing);
        self.arriving_date = Some(arriving);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripUpdate {
    pub place: Option<String>,
    pub departing_date: Option<NaiveDate>,
    pub arriving_date: Option<NaiveDate>,
}

fn validate_place(place: &str) -> Result<()> {
    require("Trip", "place", place)?;
    max_len("Trip", "place", place, PLACE_MAX)
}

fn row_to_trip(row: &Row<'_>) -> rusqlite::Result<Trip> {
    Ok(Trip {
        id: row.get(0)?,
        group_id: row.get(1)?,
        place: row.get(2)?,
        departing_date: date_column(row, 3)?,
        arriving_date: date_column(row, 4)?,
        thumbnail: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
        updated_at: timestamp_column(row, 7)?,
    })
}

impl Database {
    pub fn create_trip(&self, new_trip: &NewTrip) -> Result<Trip> {
        let today = Local::now().date_naive();
        let departing = new_trip.departing_date.unwrap_or(today);
        let arriving = new_trip.arriving_date.unwrap_or(today);
        validate_place(&new_trip.place)?;

        let now = Self::now();
        self.conn.execute(
            r#"
            INSERT INTO trips (group_id, place, departing_date, arriving_date, thumbnail, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                new_trip.group_id,
                new_trip.place,
                format_date(&departing),
                format_date(&arriving),
                new_trip.thumbnail,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(trip_id = id, group_id = new_trip.group_id, "Created trip");

        let ts = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(Trip {
            id,
            group_id: new_trip.group_id,
            place: new_trip.place.clone(),
            departing_date: departing,
            arriving_date: arriving,
            thumbnail: new_trip.thumbnail.clone(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn get_trip(&self, trip_id: i64) -> Result<Option<Trip>> {
        let sql = format!("SELECT {} FROM trips WHERE id = ?", TRIP_COLUMNS);
        let trip = self.conn.query_row(&sql, [trip_id], row_to_trip).optional()?;
        Ok(trip)
    }

    /// Trips of a group, most recent departure first.
    pub fn trips_for_group(&self, group_id: i64) -> Result<Vec<Trip>> {
        let sql = format!(
            "SELECT {} FROM trips WHERE group_id = ? ORDER BY departing_date DESC, id DESC",
            TRIP_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let trips = stmt
            .query_map([group_id], row_to_trip)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trips)
    }

    pub fn update_trip(&self, trip_id: i64, update: &TripUpdate) -> Result<Trip> {
        let mut trip = self
            .get_trip(trip_id)?
            .ok_or_else(|| Error::not_found("Trip", trip_id))?;

        if let Some(place) = &update.place {
            validate_place(place)?;
            trip.place = place.clone();
        }
        if let Some(date) = update.departing_date {
            trip.departing_date = date;
        }
        if let Some(date) = update.arriving_date {
            trip.arriving_date = date;
        }

        let now = Self::now();
        self.conn.execute(
            r#"
            UPDATE trips
            SET place = ?, departing_date = ?, arriving_date = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![
                trip.place,
                format_date(&trip.departing_date),
                format_date(&trip.arriving_date),
                now,
                trip_id,
            ],
        )?;
        trip.updated_at = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(trip)
    }

    pub fn set_trip_thumbnail(&self, trip_id: i64, thumbnail: Option<&str>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE trips SET thumbnail = ?, updated_at = ? WHERE id = ?",
            params![thumbnail, Self::now(), trip_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Trip", trip_id));
        }
        Ok(())
    }

    /// Delete a trip and, by cascade, all of its photos.
    pub fn delete_trip(&self, trip_id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM trips WHERE id = ?", [trip_id])?;
        if deleted > 0 {
            tracing::info!(trip_id, "Deleted trip");
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_create_trip_defaults_to_today() {
        let db = memory_db();
        let group = db.create_group("Crew").unwrap();
        let before = Local::now().date_naive();
        let trip = db.create_trip(&NewTrip::new(group.id, "Gyeongju")).unwrap();
        let after = Local::now().date_naive();

        assert!(trip.departing_date >= before && trip.departing_date <= after);
        assert_eq!(trip.departing_date, trip.arriving_date);
        assert!(trip.thumbnail.is_none());

        let stored = db.get_trip(trip.id).unwrap().unwrap();
        assert_eq!(stored, trip);
    }

    #[test]
    fn test_trip_requires_existing_group() {
        let db = memory_db();
        let err = db.create_trip(&NewTrip::new(404, "Nowhere")).unwrap_err();
        assert!(err.is_foreign_key_violation());
    }

    #[test]
    fn test_update_departing_date_alone() {
        let db = memory_db();
        let group = db.create_group("Crew").unwrap();
        let trip = db.create_trip(&NewTrip::new(group.id, "Jeju")).unwrap();
        let later = trip.departing_date + chrono::Duration::days(30);

        let updated = db
            .update_trip(
                trip.id,
                &TripUpdate {
                    departing_date: Some(later),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.departing_date, later);
        assert_eq!(updated.arriving_date, trip.arriving_date);
        assert_eq!(db.get_trip(trip.id).unwrap().unwrap().departing_date, later);
    }

    #[test]
    fn test_trip_place_validated() {
        let db = memory_db();
        let group = db.create_group("Crew").unwrap();
        assert!(db.create_trip(&NewTrip::new(group.id, "")).unwrap_err().is_validation());
        let trip = db.create_trip(&NewTrip::new(group.id, "Jeju")).unwrap();
        let err = db
            .update_trip(
                trip.id,
                &TripUpdate {
                    place: Some("x".repeat(51)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_update_trip_and_thumbnail() {
        let db = memory_db();
        let group = db.create_group("Crew").unwrap();
        let trip = db
            .create_trip(&NewTrip::new(group.id, "Jeju").dates(date(2024, 5, 1), date(2024, 5, 3)))
            .unwrap();

        let updated = db
            .update_trip(
                trip.id,
                &TripUpdate {
                    place: Some("Jeju-si".to_string()),
                    arriving_date: Some(date(2024, 5, 5)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.place, "Jeju-si");
        assert_eq!(updated.arriving_date, date(2024, 5, 5));

        db.set_trip_thumbnail(trip.id, Some("https://cdn.example.com/t.jpg")).unwrap();
        let stored = db.get_trip(trip.id).unwrap().unwrap();
        assert_eq!(stored.thumbnail.as_deref(), Some("https://cdn.example.com/t.jpg"));
    }

    #[test]
    fn test_trips_for_group_ordering_and_cascade() {
        let db = memory_db();
        let group = db.create_group("Crew").unwrap();
        let older = db
            .create_trip(&NewTrip::new(group.id, "Seoul").dates(date(2023, 1, 1), date(2023, 1, 2)))
            .unwrap();
        let newer = db
            .create_trip(&NewTrip::new(group.id, "Busan").dates(date(2024, 1, 1), date(2024, 1, 2)))
            .unwrap();

        let trips = db.trips_for_group(group.id).unwrap();
        assert_eq!(trips.iter().map(|t| t.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        db.delete_group(group.id).unwrap();
        assert!(db.get_trip(older.id).unwrap().is_none());
        assert!(db.get_trip(newer.id).unwrap().is_none());
    }
}
