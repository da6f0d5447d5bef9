use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod health;
mod middleware;
mod patients;
mod state;

use crate::{
    config::AppConfig,
    db::{Database, PoolPolicy, StoreKind},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::from_env()?);
    init_tracing(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_deref().unwrap_or("unset"),
        "starting patient records service"
    );

    let kind = StoreKind::from_url(&config.database.url);
    let policy = PoolPolicy::for_store(kind, &config.database);
    let db = Database::connect(&config.database.url, &policy).await?;

    db.create_schema().await?;
    if !db.ping().await {
        anyhow::bail!("database initialized but not reachable");
    }

    let state = AppState::new(config.clone(), db.clone());
    let app = app::build_app(state);

    let served = app::serve(app, &config.server).await;

    db.close().await;
    tracing::info!("database connections closed");

    served
}

fn init_tracing(config: &AppConfig) {
    let default_filter = if config.debug {
        "patient_records=debug,tower_http=debug,sqlx=info"
    } else {
        "patient_records=info,tower_http=info,sqlx=warn"
    };
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());

    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
