// Presentation layer - HTTP surface over the application services
pub mod api_error;
pub mod app_state;
pub mod handlers;
pub mod router;
