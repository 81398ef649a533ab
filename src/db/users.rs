//! User accounts.

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, is_unique_violation, Database};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Fields to change on an existing user. `None` leaves the column alone.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Database {
    /// Insert a new user. Returns `None` when the username is taken.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>> {
        let conn = self.conn()?;
        let created_at = format_timestamp(Utc::now());
        let inserted = conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            params![username, email, password_hash, created_at],
        );
        match inserted {
            Ok(_) => Ok(Some(User {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at,
            })),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [user_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"),
                [username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Apply a partial update. A username change is copied onto the user's
    /// observations in the same transaction. Returns `None` when the new
    /// username belongs to someone else.
    pub fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<Option<User>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(username) = &update.username {
            let renamed = tx.execute(
                "UPDATE users SET username = ? WHERE id = ?",
                params![username, user_id],
            );
            match renamed {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
            tx.execute(
                "UPDATE observations SET uploader_username = ? WHERE uploader_id = ?",
                params![username, user_id],
            )?;
        }
        if let Some(email) = &update.email {
            tx.execute(
                "UPDATE users SET email = ? WHERE id = ?",
                params![email, user_id],
            )?;
        }
        if let Some(password_hash) = &update.password_hash {
            tx.execute(
                "UPDATE users SET password_hash = ? WHERE id = ?",
                params![password_hash, user_id],
            )?;
        }

        let user = tx
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [user_id],
                user_from_row,
            )
            .optional()?;
        tx.commit()?;
        Ok(user)
    }
}
