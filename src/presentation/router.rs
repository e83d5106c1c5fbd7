// Route table and HTTP middleware
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    add_dashboard_version, add_saved_chart_version, create_dashboard, create_project,
    create_saved_chart, create_space, delete_dashboard, delete_saved_chart, get_dashboard,
    get_saved_chart, health_check, list_dashboards, list_saved_charts, list_spaces,
    update_dashboard, update_saved_chart,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/projects", post(create_project))
        .route(
            "/projects/:project_uuid/spaces",
            get(list_spaces).post(create_space),
        )
        .route(
            "/projects/:project_uuid/saved",
            get(list_saved_charts).post(create_saved_chart),
        )
        .route(
            "/saved/:saved_uuid",
            get(get_saved_chart)
                .patch(update_saved_chart)
                .delete(delete_saved_chart),
        )
        .route("/saved/:saved_uuid/version", post(add_saved_chart_version))
        .route("/projects/:project_uuid/dashboards", get(list_dashboards))
        .route("/spaces/:space_uuid/dashboards", post(create_dashboard))
        .route(
            "/dashboards/:dashboard_uuid",
            get(get_dashboard)
                .patch(update_dashboard)
                .delete(delete_dashboard),
        )
        .route(
            "/dashboards/:dashboard_uuid/versions",
            post(add_dashboard_version),
        );

    Router::new()
        .route("/healthz", get(health_check))
        .nest("/api/v1", api)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
