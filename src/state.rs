use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::db::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: Database) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        Self { db, config, jwt }
    }

    #[cfg(test)]
    pub fn test_config() -> AppConfig {
        use crate::config::{DatabaseConfig, JwtConfig, ServerConfig};

        AppConfig {
            database: DatabaseConfig {
                url: "sqlite::memory:".into(),
                pool_size: 10,
                max_overflow: 20,
                recycle_secs: 3600,
                echo: false,
            },
            jwt: JwtConfig {
                secret: "test-secret-key".into(),
                ttl_minutes: 60,
            },
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            environment: Some("test".into()),
            debug: true,
            log_json: false,
        }
    }

    /// State over a fresh in-memory database.
    #[cfg(test)]
    pub async fn fake() -> Self {
        Self::new(Arc::new(Self::test_config()), crate::db::memory_db().await)
    }
}
