use sqlx::AnyConnection;

use crate::{
    auth::repo_types::{User, UserRow},
    db::{from_micros, now_micros},
};

#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("username already exists")]
    UsernameTaken,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl User {
    pub async fn find_by_username(
        conn: &mut AnyConnection,
        username: &str,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, hashed_password, is_active, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(User::try_from).transpose()
    }

    /// Inserts a new active user. A unique-constraint hit becomes `UsernameTaken`.
    pub async fn create(
        conn: &mut AnyConnection,
        username: &str,
        password_hash: &str,
    ) -> Result<User, CreateUserError> {
        let created_at = now_micros();
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, hashed_password, is_active, created_at)
            VALUES ($1, $2, 1, $3)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CreateUserError::UsernameTaken
            }
            other => CreateUserError::Database(other),
        })?;

        Ok(User {
            id,
            username: username.to_string(),
            hashed_password: password_hash.to_string(),
            is_active: true,
            created_at: from_micros(created_at)?,
        })
    }
}
