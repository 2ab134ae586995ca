//! Trip photo sharing backend.
//!
//! Users belong to groups, groups own trips, trips own photos. Photos carry
//! object-detection (Yolo) and face tags. The [`retention`] job purges photos
//! past the retention window from both the object store and the database.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod retention;
pub mod storage;

pub use error::{Error, Result, ValidationError};
