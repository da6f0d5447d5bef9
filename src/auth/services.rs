use sqlx::AnyConnection;
use tracing::{debug, warn};

use crate::{
    auth::{jwt::JwtKeys, password::verify_password, repo_types::User},
    error::ApiError,
};

pub(crate) const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// Looks up `username` and checks `password` against its hash.
/// `Ok(None)` covers both an unknown user and a wrong password.
pub async fn authenticate(
    conn: &mut AnyConnection,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let Some(user) = User::find_by_username(conn, username).await? else {
        debug!(username, "login for unknown user");
        return Ok(None);
    };
    if !verify_password(password, &user.hashed_password)? {
        warn!(user_id = user.id, "login with invalid password");
        return Ok(None);
    }
    Ok(Some(user))
}

/// Maps a bearer token to the stored credential it names.
pub async fn resolve_current_user(
    conn: &mut AnyConnection,
    keys: &JwtKeys,
    token: &str,
) -> Result<User, ApiError> {
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        ApiError::Unauthorized(INVALID_CREDENTIALS)
    })?;

    if claims.sub.is_empty() {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    User::find_by_username(conn, &claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(username = %claims.sub, "token subject no longer exists");
            ApiError::Unauthorized(INVALID_CREDENTIALS)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::hash_password, config::JwtConfig, db::memory_db};

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret-key".into(),
            ttl_minutes: 60,
        })
    }

    #[tokio::test]
    async fn authenticate_checks_user_and_password() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let hash = hash_password("pass1234").unwrap();
        User::create(&mut conn, "bob", &hash).await.unwrap();

        let ok = authenticate(&mut conn, "bob", "pass1234").await.unwrap();
        assert_eq!(ok.map(|u| u.username).as_deref(), Some("bob"));
        assert!(authenticate(&mut conn, "bob", "wrong-pass").await.unwrap().is_none());
        assert!(authenticate(&mut conn, "eve", "pass1234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn token_resolves_until_it_expires() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let keys = keys();
        let user = User::create(&mut conn, "bob", "hash").await.unwrap();

        let token = keys.sign_access("bob").unwrap();
        let resolved = resolve_current_user(&mut conn, &keys, &token).await.unwrap();
        assert_eq!(resolved.id, user.id);

        let expired = keys
            .sign_with_ttl("bob", time::Duration::seconds(-1))
            .unwrap();
        let err = resolve_current_user(&mut conn, &keys, &expired)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn token_for_missing_user_is_unauthorized() {
        let db = memory_db().await;
        let mut conn = db.acquire().await.unwrap();
        let keys = keys();

        let token = keys.sign_access("ghost").unwrap();
        let err = resolve_current_user(&mut conn, &keys, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let empty = keys.sign_access("").unwrap();
        let err = resolve_current_user(&mut conn, &keys, &empty)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
