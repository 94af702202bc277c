use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use pama_core::{CdsConfig, CdsService};

/// Main entry point for the PAMA decision-support server
///
/// Loads `.env`, resolves the core configuration once, builds the vocabularies, search indexes
/// and trigger registry, then serves the REST API (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `PAMA_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PAMA_DEBOUNCE_MS`: interactive search debounce window (default: 200)
/// - `PAMA_SEARCH_LIMIT`: cap on search results (default: 50)
/// - `PAMA_DEFAULT_OPTIONS_LIMIT`: options listed before typing (default: 10)
/// - `PAMA_PROCEDURES_VALUESET` / `PAMA_REASONS_VALUESET`: ValueSet files replacing the bundled
///   vocabularies
/// - `PAMA_DRAFT_REQUEST_ID`: id of the draft ServiceRequest (default: "example-request-id")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pama_run=info".parse()?)
                .add_directive("pama_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("PAMA_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = CdsConfig::from_lookup(|name| std::env::var(name).ok())?;
    let service = CdsService::new(cfg)?;

    tracing::info!("++ Starting PAMA REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(AppState::new(service))).await?;

    Ok(())
}
