pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;

use crate::core::config::{Settings, StorageBackend};
use crate::core::{redis::RedisHandle, state::AppState, telemetry};
use crate::repositories::memory::MemoryStore;
use crate::repositories::store::PgStore;
use crate::services::activity::ActivitySink;

async fn build_state(settings: Settings) -> anyhow::Result<AppState> {
    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without cache");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let activity = ActivitySink::from_settings(&settings)?;

    let state = match settings.storage().backend {
        StorageBackend::Postgres => {
            let db_pool = db::init_pool(&settings).await?;
            db::run_migrations(&db_pool).await?;
            let store = Arc::new(PgStore::new(db_pool));
            AppState::new(settings, store.clone(), store, redis, activity)
        }
        StorageBackend::Memory => {
            let store = match &settings.storage().fixtures_path {
                Some(path) => Arc::new(
                    MemoryStore::load_fixtures(path).context("Failed to seed in-memory store")?,
                ),
                None => Arc::new(MemoryStore::new()),
            };
            tracing::warn!(
                exams = store.exam_count(),
                "Using in-memory attempt store; data is lost on restart"
            );
            AppState::new(settings, store.clone(), store, redis, activity)
        }
    };

    Ok(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let state = build_state(settings).await?;
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Examiner API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_signal("api"))
        .await;

    state.redis().disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let state = build_state(settings).await?;
    let result = tasks::scheduler::run(state.clone()).await;

    state.redis().disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
