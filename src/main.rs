// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::DashboardService;
use crate::application::saved_chart_service::SavedChartService;
use crate::application::space_service::SpaceService;
use crate::infrastructure::config::load_config;
use crate::infrastructure::database;
use crate::infrastructure::sqlite_dashboard_repository::SqliteDashboardRepository;
use crate::infrastructure::sqlite_saved_chart_repository::SqliteSavedChartRepository;
use crate::infrastructure::sqlite_space_repository::SqliteSpaceRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = load_config()?;

    // Initialize tracing; RUST_LOG takes precedence over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Open the database (infrastructure layer)
    let pool = database::connect(&config.database).await?;

    // Create repositories and services (application layer)
    let space_service = SpaceService::new(Arc::new(SqliteSpaceRepository::new(pool.clone())));
    let saved_chart_service =
        SavedChartService::new(Arc::new(SqliteSavedChartRepository::new(pool.clone())));
    let dashboard_service =
        DashboardService::new(Arc::new(SqliteDashboardRepository::new(pool.clone())));

    // Create application state
    let state = Arc::new(AppState {
        space_service,
        saved_chart_service,
        dashboard_service,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Starting vizstore service");

    axum::serve(listener, router).await?;

    pool.close().await;
    Ok(())
}
