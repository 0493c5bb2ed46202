use axum::{extract::DefaultBodyLimit, Router};
use clap::Parser;
use common::{AppState, Config};
use database::Database;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize Logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Load Config from .env, environment and CLI args
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }
    let config = Config::parse();

    // 3. Initialize Database
    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    // 4. Upload storage
    tokio::fs::create_dir_all(config.failed_import_dir()).await?;
    tracing::info!("Storing uploads in {}", config.upload_dir.display());

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    // 5. Routing
    let app = app(state);

    // 6. Start Server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::<Arc<AppState>>::new()
        .nest("/transactions", transactions::handler::transactions_router(state.clone()))
        .nest("/categories", categories::handler::categories_router(state.clone()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
