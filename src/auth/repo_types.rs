use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::from_micros;

/// Raw `users` row.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub hashed_password: String,
    pub is_active: i64,
    pub created_at: i64, // unix microseconds
}

/// User record in the database.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String, // Argon2 hash, not exposed in JSON
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            username: r.username,
            hashed_password: r.hashed_password,
            is_active: r.is_active != 0,
            created_at: from_micros(r.created_at)?,
        })
    }
}
