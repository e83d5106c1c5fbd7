// Domain layer - Saved content and its containers
pub mod dashboard;
pub mod saved_chart;
pub mod space;
