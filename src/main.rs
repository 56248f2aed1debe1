use anyhow::Context;
use pledgeflow::config::Config;
use pledgeflow::{create_app, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load .env (if present) before reading configuration
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("invalid configuration")?;
    config.log_summary();

    let store = store::connect(&config).await.context("failed to connect to the database")?;
    let app = create_app(AppState::from_config(&config, store));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
