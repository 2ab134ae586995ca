//! Credential checks and permissions, independent of any web framework.

pub mod password;

use crate::db::{Database, User};
use crate::error::Result;

/// Actions a user may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ViewTrip(i64),
    UploadToTrip(i64),
    ManageGroup(i64),
    /// Trigger the photo retention job by hand.
    RunRetention,
}

pub trait Authenticator {
    /// The user when the password matches an active account, otherwise `None`.
    fn verify_credentials(&self, user_id: &str, password: &str) -> Result<Option<User>>;

    fn has_permission(&self, user: &User, permission: Permission) -> Result<bool>;
}

/// Authenticates against the users table. Admins may do anything, inactive
/// accounts nothing, and everyone else acts within groups where their
/// membership is confirmed.
pub struct DatabaseAuthenticator<'a> {
    db: &'a Database,
}

impl<'a> DatabaseAuthenticator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn is_confirmed_member(&self, group_id: i64, user_id: &str) -> Result<bool> {
        Ok(self
            .db
            .get_membership(group_id, user_id)?
            .map(|m| m.is_confirmed)
            .unwrap_or(false))
    }

    fn trip_group(&self, trip_id: i64) -> Result<Option<i64>> {
        Ok(self.db.get_trip(trip_id)?.map(|t| t.group_id))
    }
}

impl Authenticator for DatabaseAuthenticator<'_> {
    fn verify_credentials(&self, user_id: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.db.get_user(user_id)? else {
            return Ok(None);
        };
        if !user.is_active {
            tracing::debug!(user_id, "Login rejected for inactive user");
            return Ok(None);
        }
        let matches = self
            .db
            .get_password_hash(user_id)?
            .map(|hash| password::verify_password(password, &hash))
            .unwrap_or(false);
        Ok(matches.then_some(user))
    }

    fn has_permission(&self, user: &User, permission: Permission) -> Result<bool> {
        if !user.is_active {
            return Ok(false);
        }
        if user.is_admin {
            return Ok(true);
        }
        match permission {
            Permission::ViewTrip(trip_id) | Permission::UploadToTrip(trip_id) => {
                match self.trip_group(trip_id)? {
                    Some(group_id) => self.is_confirmed_member(group_id, &user.id),
                    None => Ok(false),
                }
            }
            Permission::ManageGroup(group_id) => self.is_confirmed_member(group_id, &user.id),
            Permission::RunRetention => Ok(false),
        }
    }
}
