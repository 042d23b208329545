use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use echo_types::{NewUser, User};

use super::{json_column, page_offset, timestamp_column, uuid_column, PAGE_SIZE};
use crate::db::DbPool;

const USER_COLUMNS: &str =
    "id, seed_index, name, username, email, phone, website, address, company, created_at";

pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: uuid_column(row, 0)?,
            seed_index: row.get(1)?,
            name: row.get(2)?,
            username: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            website: row.get(6)?,
            address: json_column(row, 7)?,
            company: json_column(row, 8)?,
            created_at: timestamp_column(row, 9)?,
        })
    }

    /// Insert a synthesized user and return the stored row
    pub fn create(&self, new_user: &NewUser) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            seed_index: new_user.seed_index,
            name: new_user.name.clone(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            phone: new_user.phone.clone(),
            website: new_user.website.clone(),
            address: new_user.address.clone(),
            company: new_user.company.clone(),
            created_at: Utc::now(),
        };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (id, seed_index, name, username, email, phone, website, address, company, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                user.id.to_string(),
                user.seed_index,
                &user.name,
                &user.username,
                &user.email,
                &user.phone,
                &user.website,
                serde_json::to_string(&user.address)?,
                serde_json::to_string(&user.company)?,
                user.created_at.to_rfc3339(),
            ),
        )
        .with_context(|| format!("Failed to create user {}", user.username))?;

        Ok(user)
    }

    /// Get user by ID
    pub fn get_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))?;
        let user = stmt
            .query_row([user_id.to_string()], Self::map_row)
            .optional()?;
        Ok(user)
    }

    /// Get one page of users, oldest first
    pub fn list(&self, page: u32) -> Result<Vec<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY seed_index ASC LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map((PAGE_SIZE, page_offset(page)), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Total number of users
    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}
