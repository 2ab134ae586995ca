//! Travel groups and their memberships.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_timestamp, timestamp_column, Database};
use crate::error::{max_len, require, Error, Result};

const NAME_MAX: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a group. Invitations start unconfirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub id: i64,
    pub user_id: String,
    pub group_id: i64,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: timestamp_column(row, 2)?,
        updated_at: timestamp_column(row, 3)?,
    })
}

fn row_to_membership(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        user_id: row.get(1)?,
        group_id: row.get(2)?,
        is_confirmed: row.get::<_, i32>(3)? != 0,
        created_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}

fn validate_name(name: &str) -> Result<()> {
    require("Group", "name", name)?;
    max_len("Group", "name", name, NAME_MAX)
}

impl Database {
    // ========================================================================
    // Groups
    // ========================================================================

    pub fn create_group(&self, name: &str) -> Result<Group> {
        validate_name(name)?;
        let now = Self::now();
        self.conn.execute(
            "INSERT INTO trip_groups (name, created_at, updated_at) VALUES (?, ?, ?)",
            params![name, now, now],
        )?;
        let id = self.conn.last_insert_rowid();
        let ts = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(Group {
            id,
            name: name.to_string(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn get_group(&self, group_id: i64) -> Result<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM trip_groups WHERE id = ?",
                [group_id],
                row_to_group,
            )
            .optional()?;
        Ok(group)
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at, updated_at FROM trip_groups ORDER BY id")?;
        let groups = stmt
            .query_map([], row_to_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn rename_group(&self, group_id: i64, name: &str) -> Result<()> {
        validate_name(name)?;
        let changed = self.conn.execute(
            "UPDATE trip_groups SET name = ?, updated_at = ? WHERE id = ?",
            params![name, Self::now(), group_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Group", group_id));
        }
        Ok(())
    }

    /// Delete a group together with its memberships, trips and their photos.
    pub fn delete_group(&self, group_id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM trip_groups WHERE id = ?", [group_id])?;
        Ok(deleted > 0)
    }

    // ========================================================================
    // Memberships
    // ========================================================================

    /// Invite a user into a group. The membership is unconfirmed until
    /// [`Database::confirm_membership`] is called.
    pub fn add_member(&self, group_id: i64, user_id: &str) -> Result<Membership> {
        let now = Self::now();
        self.conn.execute(
            r#"
            INSERT INTO user_groups (user_id, group_id, is_confirmed, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            "#,
            params![user_id, group_id, now, now],
        )?;
        let id = self.conn.last_insert_rowid();
        let ts = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(Membership {
            id,
            user_id: user_id.to_string(),
            group_id,
            is_confirmed: false,
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn confirm_membership(&self, group_id: i64, user_id: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE user_groups SET is_confirmed = 1, updated_at = ? WHERE group_id = ? AND user_id = ?",
            params![Self::now(), group_id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("Membership", format!("{}/{}", group_id, user_id)));
        }
        Ok(())
    }

    pub fn get_membership(&self, group_id: i64, user_id: &str) -> Result<Option<Membership>> {
        let membership = self
            .conn
            .query_row(
                r#"
                SELECT id, user_id, group_id, is_confirmed, created_at, updated_at
                FROM user_groups
                WHERE group_id = ? AND user_id = ?
                "#,
                params![group_id, user_id],
                row_to_membership,
            )
            .optional()?;
        Ok(membership)
    }

    pub fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, group_id, is_confirmed, created_at, updated_at
            FROM user_groups
            WHERE user_id = ?
            ORDER BY group_id
            "#,
        )?;
        let memberships = stmt
            .query_map([user_id], row_to_membership)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(memberships)
    }

    pub fn members_of_group(&self, group_id: i64) -> Result<Vec<Membership>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, group_id, is_confirmed, created_at, updated_at
            FROM user_groups
            WHERE group_id = ?
            ORDER BY created_at, id
            "#,
        )?;
        let memberships = stmt
            .query_map([group_id], row_to_membership)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(memberships)
    }

    pub fn remove_member(&self, group_id: i64, user_id: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM user_groups WHERE group_id = ? AND user_id = ?",
            params![group_id, user_id],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::memory_db;
    use crate::db::NewUser;

    #[test]
    fn test_create_and_rename_group() {
        let db = memory_db();
        let group = db.create_group("Jeju 2024").unwrap();
        assert_eq!(db.get_group(group.id).unwrap().unwrap().name, "Jeju 2024");

        db.rename_group(group.id, "Jeju 2025").unwrap();
        assert_eq!(db.get_group(group.id).unwrap().unwrap().name, "Jeju 2025");

        assert!(db.rename_group(999, "x").is_err());
        assert!(db.create_group("").unwrap_err().is_validation());
        assert!(db.create_group(&"g".repeat(21)).unwrap_err().is_validation());
    }

    #[test]
    fn test_membership_lifecycle() {
        let db = memory_db();
        db.create_user(&NewUser::new("u1", "One", "one@example.com")).unwrap();
        let group = db.create_group("Crew").unwrap();

        let membership = db.add_member(group.id, "u1").unwrap();
        assert!(!membership.is_confirmed);

        db.confirm_membership(group.id, "u1").unwrap();
        let stored = db.get_membership(group.id, "u1").unwrap().unwrap();
        assert!(stored.is_confirmed);

        assert_eq!(db.memberships_for_user("u1").unwrap().len(), 1);
        assert_eq!(db.members_of_group(group.id).unwrap().len(), 1);

        assert!(db.remove_member(group.id, "u1").unwrap());
        assert!(db.get_membership(group.id, "u1").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_membership_rejected() {
        let db = memory_db();
        db.create_user(&NewUser::new("u1", "One", "one@example.com")).unwrap();
        let group = db.create_group("Crew").unwrap();
        db.add_member(group.id, "u1").unwrap();
        assert!(db.add_member(group.id, "u1").unwrap_err().is_unique_violation());
    }

    #[test]
    fn test_membership_requires_existing_user() {
        let db = memory_db();
        let group = db.create_group("Crew").unwrap();
        let err = db.add_member(group.id, "ghost").unwrap_err();
        assert!(err.is_foreign_key_violation());
    }

    #[test]
    fn test_membership_cascades_with_user_and_group() {
        let db = memory_db();
        db.create_user(&NewUser::new("u1", "One", "one@example.com")).unwrap();
        db.create_user(&NewUser::new("u2", "Two", "two@example.com")).unwrap();
        let a = db.create_group("A").unwrap();
        let b = db.create_group("B").unwrap();
        db.add_member(a.id, "u1").unwrap();
        db.add_member(b.id, "u2").unwrap();

        db.delete_user("u1").unwrap();
        assert!(db.members_of_group(a.id).unwrap().is_empty());

        db.delete_group(b.id).unwrap();
        assert!(db.memberships_for_user("u2").unwrap().is_empty());
        assert!(db.get_user("u2").unwrap().is_some());
    }
}
