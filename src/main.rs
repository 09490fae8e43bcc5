//! Trip Journal mock backend.
//!
//! Serves trips, activities and statistics from flat JSON files and issues mock bearer tokens.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trip_journal::config::Config;
use trip_journal::{create_router, db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Trip Journal mock backend");
    tracing::info!("Data directory: {:?}", config.data_dir);
    tracing::info!("Uploads directory: {:?}", config.uploads_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.uses_dev_secrets() {
        tracing::warn!(
            "Using development token secrets (TRIPS_JWT_SECRET / TRIPS_JWT_REFRESH_SECRET)"
        );
    }

    tokio::fs::create_dir_all(&config.uploads_dir).await?;

    // Load the dataset
    let repo = db::init_dataset(&config.trips_path(), &config.activities_path()).await?;

    let bind_addr = config.bind_addr;
    let app = create_router(AppState::new(repo, config));

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
