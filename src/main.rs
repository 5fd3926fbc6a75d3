use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::config::{app_state_from_env, rest_addr_from_env};
use hms_core::SystemClock;

/// Main entry point for the HMS application
///
/// Loads `.env`, configures tracing, resolves the configuration once and serves the REST API
/// (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `HMS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HMS_DATA_DIR`: data directory (default: "hms_data")
/// - `HMS_STORAGE`: `file` (default) or `memory`
/// - `HMS_STAFF_FILE`: staff roster file (default: `<HMS_DATA_DIR>/staff.yaml`)
/// - `HMS_AUDIT_CAPACITY`: audit events kept in memory (default: 1000)
/// - `API_KEY`: value required in the `x-api-key` header; unset disables the check
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
                .add_directive("hms=info".parse()?)
                .add_directive("hms_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = rest_addr_from_env();
    let state = app_state_from_env(Arc::new(SystemClock))?;
    let app = api_rest::router(state);

    tracing::info!("-- Starting HMS REST API on {}", rest_addr);
    tracing::info!("-- Swagger UI at http://{}/swagger-ui", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
