use std::net::SocketAddr;

use anyhow::Context;
use seatplan_api::{app, session::spawn_idle_sweeper, AppState};
use seatplan_store::{app_config::Config, SnapshotAdapter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatplan_api=debug,seatplan_store=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting seatplan API on port {}", config.server.port);

    let storage = seatplan_store::connect(&config)
        .await
        .context("Failed to open snapshot storage")?;
    let snapshots = SnapshotAdapter::from_config(storage, &config.persistence);

    let app_state = AppState::new(snapshots, &config.persistence, &config.stream);
    spawn_idle_sweeper(app_state.registry.clone(), &config.session);
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
