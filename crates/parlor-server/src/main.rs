//! # Parlor Server
//!
//! Minimal polling chat-room backend.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (in-memory store)
//! parlor
//!
//! # Persist to SQLite
//! PARLOR_STORE=sqlite PARLOR_DATABASE_URL=sqlite://parlor.db parlor
//!
//! # Run with environment variables
//! PARLOR_PORT=5000 PARLOR_HOST=0.0.0.0 parlor
//! ```

mod config;
mod error;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment from .env, if present
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=debug,parlor_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(
        backend = ?config.store.backend,
        "Starting Parlor server on {}:{}",
        config.host,
        config.port
    );

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
