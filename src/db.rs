use std::{path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use sqlx::{
    any::{AnyConnectOptions, AnyPoolOptions},
    pool::PoolConnection,
    Any, AnyPool, ConnectOptions, Transaction,
};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::config::DatabaseConfig;

/// A unit of work. Commit explicitly; dropping it rolls back.
pub type Session = Transaction<'static, Any>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// File-backed or in-memory SQLite.
    Sqlite,
    /// Anything reached over the network (Postgres).
    Networked,
}

impl StoreKind {
    pub fn from_url(url: &str) -> Self {
        if url.trim_start().starts_with("sqlite:") {
            StoreKind::Sqlite
        } else {
            StoreKind::Networked
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPolicy {
    pub min_connections: u32,
    pub max_connections: u32,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    pub echo: bool,
}

impl PoolPolicy {
    pub fn for_store(kind: StoreKind, cfg: &DatabaseConfig) -> Self {
        match kind {
            // One connection that is never closed: keeps `:memory:` alive and
            // serializes access from every handler.
            StoreKind::Sqlite => Self {
                min_connections: 1,
                max_connections: 1,
                idle_timeout: None,
                max_lifetime: None,
                echo: cfg.echo,
            },
            StoreKind::Networked => Self {
                min_connections: 0,
                max_connections: (cfg.pool_size + cfg.max_overflow).max(1),
                idle_timeout: Some(Duration::from_secs(600)),
                max_lifetime: Some(Duration::from_secs(cfg.recycle_secs)),
                echo: cfg.echo,
            },
        }
    }
}

const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL CHECK (age BETWEEN 0 AND 120),
        symptoms TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients (created_at)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(50) NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        is_active BIGINT NOT NULL DEFAULT 1,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        age BIGINT NOT NULL CHECK (age BETWEEN 0 AND 120),
        symptoms TEXT NOT NULL DEFAULT '[]',
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients (created_at)",
];

/// Connection pool handle shared by every request.
#[derive(Clone, Debug)]
pub struct Database {
    pool: AnyPool,
    kind: StoreKind,
}

impl Database {
    pub async fn connect(url: &str, policy: &PoolPolicy) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();

        let kind = StoreKind::from_url(url);
        let url = match kind {
            StoreKind::Sqlite => prepare_sqlite_url(url)?,
            StoreKind::Networked => url.to_string(),
        };

        let mut options = AnyConnectOptions::from_str(&url).context("invalid database URL")?;
        if !policy.echo {
            options = options.disable_statement_logging();
        }

        let pool = AnyPoolOptions::new()
            .min_connections(policy.min_connections)
            .max_connections(policy.max_connections)
            .idle_timeout(policy.idle_timeout)
            .max_lifetime(policy.max_lifetime)
            .acquire_timeout(Duration::from_secs(30))
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .context("connect to database")?;

        match kind {
            StoreKind::Sqlite => info!("using SQLite database (single shared connection)"),
            StoreKind::Networked => info!(
                max_connections = policy.max_connections,
                "using networked SQL database"
            ),
        }
        Ok(Self { pool, kind })
    }

    /// Creates missing tables. Existing tables and rows are left alone.
    pub async fn create_schema(&self) -> anyhow::Result<()> {
        let statements = match self.kind {
            StoreKind::Sqlite => SQLITE_SCHEMA,
            StoreKind::Networked => POSTGRES_SCHEMA,
        };
        for stmt in statements {
            sqlx::query(stmt).execute(&self.pool).await.map_err(|e| {
                error!(error = %e, "creating database schema failed");
                anyhow::Error::new(e).context("create schema")
            })?;
        }
        info!("database schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "database connectivity check failed");
                false
            }
        }
    }

    pub async fn session(&self) -> Result<Session, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Any>, sqlx::Error> {
        self.pool.acquire().await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Path of the database file for file-backed SQLite URLs.
fn sqlite_file_path(url: &str) -> Option<&str> {
    let rest = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}

/// Creates the parent directory of a file database and asks the driver to
/// create the file itself when it does not exist yet.
fn prepare_sqlite_url(url: &str) -> anyhow::Result<String> {
    let Some(path) = sqlite_file_path(url) else {
        return Ok(url.to_string());
    };

    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            info!(dir = %dir.display(), "creating directory for SQLite database");
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create sqlite directory {}", dir.display()))?;
        }
    }

    if url.contains("mode=") {
        Ok(url.to_string())
    } else if url.contains('?') {
        Ok(format!("{url}&mode=rwc"))
    } else {
        Ok(format!("{url}?mode=rwc"))
    }
}

pub fn to_micros(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000) as i64
}

pub fn from_micros(us: i64) -> anyhow::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(us) * 1_000)
        .with_context(|| format!("timestamp out of range: {us}"))
}

pub fn now_micros() -> i64 {
    to_micros(OffsetDateTime::now_utc())
}

#[cfg(test)]
pub(crate) async fn memory_db() -> Database {
    let cfg = DatabaseConfig {
        url: "sqlite::memory:".into(),
        pool_size: 10,
        max_overflow: 20,
        recycle_secs: 3600,
        echo: false,
    };
    let policy = PoolPolicy::for_store(StoreKind::Sqlite, &cfg);
    let db = Database::connect(&cfg.url, &policy)
        .await
        .expect("in-memory database");
    db.create_schema().await.expect("schema");
    db
}
