use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use riskcare_core::{CoreConfig, Platform, resolve_data_dir, storage_backend_from_env_value};

/// Main entry point for the RiskCare application
///
/// Starts the REST server with OpenAPI/Swagger documentation. Configuration is read from the
/// environment once, here, and passed down.
///
/// # Environment Variables
/// - `RISKCARE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `RISKCARE_DATA_DIR`: Directory for records and documents (default: "risk_data")
/// - `RISKCARE_STORAGE`: `files` (default) or `memory`
/// - `API_KEY`: API key every protected request must present in `x-api-key`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, storage or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("riskcare_run=info".parse()?)
                .add_directive("riskcare_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("RISKCARE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .context("API_KEY not set in environment")?;

    let data_dir = resolve_data_dir(std::env::var("RISKCARE_DATA_DIR").ok());
    let backend = storage_backend_from_env_value(std::env::var("RISKCARE_STORAGE").ok())?;
    let config = CoreConfig::new(data_dir, backend)?;

    let platform = Platform::from_config(&config)?;
    platform.accounts.seed_doctors()?;

    tracing::info!("++ Starting RiskCare REST on {}", rest_addr);

    let app = api_rest::router(AppState::new(platform, api_key));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
