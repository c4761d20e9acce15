mod analysis;
mod analysis_cache;
mod circuit_breaker;
mod config;
mod db;
mod distribution;
mod errors;
mod handlers;
mod models;
mod payment_client;
mod postcode;
mod services;
mod wallet_handler;
mod wallet_models;

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool, the analysis
/// cache, the payment gateway client and the HTTP router, then starts the
/// Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movco_lead_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Vision analysis response cache (1 hour TTL, 10k max entries).
    // Keyed by address pair + photo set; entries are checksum-validated.
    let analysis_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(10_000)
        .build();
    tracing::info!("Analysis response cache initialized (1h TTL, 10k capacity)");

    // Circuit breaker shared across vision-service calls
    let vision_breaker = circuit_breaker::create_vision_circuit_breaker();

    // Initialize payment gateway client
    let payment_client = match payment_client::PaymentClient::new(
        config.gateway_base_url.clone(),
        config.gateway_secret_key.clone(),
    ) {
        Ok(client) => {
            tracing::info!("✓ Payment gateway client initialized: {}", config.gateway_base_url);
            Some(client)
        }
        Err(e) => {
            tracing::error!("Failed to initialize payment gateway client: {}", e);
            None
        }
    };

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        db: db.pool.clone(),
        config: config.clone(),
        payment_client,
        analysis_cache,
        vision_breaker,
    });

    let app = handlers::build_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
