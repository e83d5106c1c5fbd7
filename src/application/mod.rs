// Application layer - Use cases and repository ports
pub mod dashboard_repository;
pub mod dashboard_service;
pub mod error;
pub mod saved_chart_repository;
pub mod saved_chart_service;
pub mod space_repository;
pub mod space_service;
