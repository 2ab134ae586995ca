//! User accounts.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_timestamp, timestamp_column, Database};
use crate::auth::password;
use crate::error::{max_len, require, Error, Result, ValidationError};

const ID_MAX: usize = 25;
const NAME_MAX: usize = 20;
const EMAIL_MAX: usize = 255;

const USER_COLUMNS: &str = "id, name, email, is_active, is_admin, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Staff access follows the admin flag.
    pub fn is_staff(&self) -> bool {
        self.is_admin
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Input for [`Database::create_user`].
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    /// `None` leaves the account without a usable password.
    pub password: Option<String>,
}

impl NewUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    fn validate(&self) -> Result<()> {
        require("User", "id", &self.id)?;
        require("User", "name", &self.name)?;
        require("User", "email", &self.email)?;
        max_len("User", "id", &self.id, ID_MAX)?;
        max_len("User", "name", &self.name, NAME_MAX)?;
        max_len("User", "email", &self.email, EMAIL_MAX)?;
        if !self.email.contains('@') {
            return Err(ValidationError::Invalid(format!("invalid email address: {}", self.email)).into());
        }
        Ok(())
    }
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

/// Lowercase the domain part of an address, keeping the local part as given.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        is_active: row.get::<_, i32>(3)? != 0,
        is_admin: row.get::<_, i32>(4)? != 0,
        created_at: timestamp_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
    })
}

impl Database {
    /// Create a regular user. Fails before touching the database when id,
    /// name or email is missing.
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        self.insert_user(new_user, false)
    }

    pub fn create_superuser(&self, new_user: &NewUser) -> Result<User> {
        self.insert_user(new_user, true)
    }

    fn insert_user(&self, new_user: &NewUser, is_admin: bool) -> Result<User> {
        new_user.validate()?;

        let email = normalize_email(&new_user.email);
        let password_hash = new_user
            .password
            .as_deref()
            .map(password::hash_password)
            .transpose()?;
        let now = Self::now();

        self.conn.execute(
            r#"
            INSERT INTO users (id, name, email, password_hash, is_active, is_admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?)
            "#,
            params![new_user.id, new_user.name, email, password_hash, is_admin, now, now],
        )?;

        tracing::info!(user_id = %new_user.id, is_admin, "Created user");

        let ts = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(User {
            id: new_user.id.clone(),
            name: new_user.name.clone(),
            email,
            is_active: true,
            is_admin,
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = self.conn.query_row(&sql, [user_id], row_to_user).optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let user = self
            .conn
            .query_row(&sql, [normalize_email(email)], row_to_user)
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY name, id", USER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn count_users(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<User> {
        let mut user = self
            .get_user(user_id)?
            .ok_or_else(|| Error::not_found("User", user_id))?;

        if let Some(name) = &update.name {
            require("User", "name", name)?;
            max_len("User", "name", name, NAME_MAX)?;
            user.name = name.clone();
        }
        if let Some(email) = &update.email {
            require("User", "email", email)?;
            max_len("User", "email", email, EMAIL_MAX)?;
            user.email = normalize_email(email);
        }
        if let Some(active) = update.is_active {
            user.is_active = active;
        }
        if let Some(admin) = update.is_admin {
            user.is_admin = admin;
        }

        let now = Self::now();
        self.conn.execute(
            r#"
            UPDATE users
            SET name = ?, email = ?, is_active = ?, is_admin = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![user.name, user.email, user.is_active, user.is_admin, now, user_id],
        )?;
        user.updated_at = parse_timestamp(&now).unwrap_or_else(|_| Utc::now());
        Ok(user)
    }

    /// Replace the stored password. `None` makes the password unusable.
    pub fn set_password(&self, user_id: &str, new_password: Option<&str>) -> Result<()> {
        let hash = new_password.map(password::hash_password).transpose()?;
        let changed = self.conn.execute(
            "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?",
            params![hash, Self::now(), user_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("User", user_id));
        }
        Ok(())
    }

    pub(crate) fn get_password_hash(&self, user_id: &str) -> Result<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?",
                [user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(hash.flatten())
    }

    /// Delete a user. Memberships go with it; uploaded photos stay with
    /// `uploaded_by` cleared. Returns false when no such user existed.
    pub fn delete_user(&self, user_id: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM users WHERE id = ?", [user_id])?;
        if deleted > 0 {
            tracing::info!(user_id, "Deleted user");
        }
        Ok(deleted > 0)
    }
}
