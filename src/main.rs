use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pdf_rag::api;
use pdf_rag::config::Config;
use pdf_rag::process::CommandRunner;
use pdf_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Scripts directory: {}", config.scripts_dir().display());
    tracing::info!("Upload directory: {}", config.pdf_dir().display());
    tracing::info!("Index artifact: {}", config.artifact_path().display());
    match config.unit_timeout() {
        Some(t) => tracing::info!("Unit timeout: {}s", t.as_secs()),
        None => tracing::warn!("Unit timeout disabled; a hung script blocks its request"),
    }

    let runner = Arc::new(CommandRunner::new(config.unit_timeout()));
    let state = AppState::new(config.clone(), runner)?;

    let mut app = api::router(state)
        .fallback_service(ServeDir::new(config.public_dir()))
        .layer(TraceLayer::new_for_http());
    if config.allow_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running at http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
