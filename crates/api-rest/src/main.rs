//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging of the REST surface (with OpenAPI/Swagger UI). The
//! workspace's main `pama-run` binary also loads `.env` before serving the same router.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use pama_core::{CdsConfig, CdsService};

/// Main entry point for the PAMA REST API server
///
/// # Environment Variables
/// - `PAMA_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `PAMA_*`: core configuration, see `pama_core::config`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the core configuration or vocabularies are invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("pama_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("PAMA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting PAMA REST API on {}", addr);

    let cfg = CdsConfig::from_lookup(|name| std::env::var(name).ok())?;
    let service = CdsService::new(cfg)?;
    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
