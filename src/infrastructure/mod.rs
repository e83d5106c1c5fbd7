// Infrastructure layer - Configuration, database and repository adapters
pub mod config;
pub mod database;
pub mod sqlite_dashboard_repository;
pub mod sqlite_saved_chart_repository;
pub mod sqlite_space_repository;
