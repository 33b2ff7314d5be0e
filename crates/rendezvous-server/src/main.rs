#![forbid(unsafe_code)]

//! Rendezvous signaling relay binary.

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use rendezvous_server::{app, AppState, Config};

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = Config::parse();
    rendezvous_common::init_tracing_with_default(&config.log_level);
    config.validate()?;

    if !config.static_dir.is_dir() {
        warn!(
            "static directory {} not found; only API routes will answer",
            config.static_dir.display()
        );
    }

    let state = AppState::new(&config);
    let app = app::build_router(state, &config);

    let listener = TcpListener::bind(config.listen).await?;
    info!(
        "rendezvous listening on {} (join policy {:?})",
        listener.local_addr()?,
        config.join_policy
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
