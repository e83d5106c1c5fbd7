// HTTP request handlers
use crate::domain::dashboard::{
    CreateDashboard, Dashboard, DashboardSummary, DashboardVersion, UpdateDashboard,
};
use crate::domain::saved_chart::{
    CreateSavedChart, SavedChart, SavedChartSummary, SavedChartVersion, UpdateSavedChart,
};
use crate::domain::space::{CreateProject, CreateSpace, Project, Space};
use crate::presentation::api_error::ApiResult;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

// === Projects and spaces ===

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.space_service.create_project(&body.name).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_spaces(
    State(state): State<Arc<AppState>>,
    Path(project_uuid): Path<Uuid>,
) -> ApiResult<Json<Vec<Space>>> {
    Ok(Json(state.space_service.list_spaces(project_uuid).await?))
}

pub async fn create_space(
    State(state): State<Arc<AppState>>,
    Path(project_uuid): Path<Uuid>,
    Json(body): Json<CreateSpace>,
) -> ApiResult<(StatusCode, Json<Space>)> {
    let space = state
        .space_service
        .create_space(project_uuid, &body.name)
        .await?;
    Ok((StatusCode::CREATED, Json(space)))
}

// === Saved charts ===

pub async fn list_saved_charts(
    State(state): State<Arc<AppState>>,
    Path(project_uuid): Path<Uuid>,
) -> ApiResult<Json<Vec<SavedChartSummary>>> {
    Ok(Json(state.saved_chart_service.list(project_uuid).await?))
}

pub async fn create_saved_chart(
    State(state): State<Arc<AppState>>,
    Path(project_uuid): Path<Uuid>,
    Json(body): Json<CreateSavedChart>,
) -> ApiResult<(StatusCode, Json<SavedChart>)> {
    let chart = state.saved_chart_service.create(project_uuid, body).await?;
    Ok((StatusCode::CREATED, Json(chart)))
}

pub async fn get_saved_chart(
    State(state): State<Arc<AppState>>,
    Path(chart_uuid): Path<Uuid>,
) -> ApiResult<Json<SavedChart>> {
    Ok(Json(state.saved_chart_service.get(chart_uuid).await?))
}

pub async fn update_saved_chart(
    State(state): State<Arc<AppState>>,
    Path(chart_uuid): Path<Uuid>,
    Json(body): Json<UpdateSavedChart>,
) -> ApiResult<Json<SavedChart>> {
    Ok(Json(state.saved_chart_service.update(chart_uuid, body).await?))
}

pub async fn delete_saved_chart(
    State(state): State<Arc<AppState>>,
    Path(chart_uuid): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.saved_chart_service.delete(chart_uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_saved_chart_version(
    State(state): State<Arc<AppState>>,
    Path(chart_uuid): Path<Uuid>,
    Json(body): Json<SavedChartVersion>,
) -> ApiResult<(StatusCode, Json<SavedChart>)> {
    let chart = state
        .saved_chart_service
        .add_version(chart_uuid, body)
        .await?;
    Ok((StatusCode::CREATED, Json(chart)))
}

// === Dashboards ===

pub async fn list_dashboards(
    State(state): State<Arc<AppState>>,
    Path(project_uuid): Path<Uuid>,
) -> ApiResult<Json<Vec<DashboardSummary>>> {
    Ok(Json(state.dashboard_service.list(project_uuid).await?))
}

pub async fn create_dashboard(
    State(state): State<Arc<AppState>>,
    Path(space_uuid): Path<Uuid>,
    Json(body): Json<CreateDashboard>,
) -> ApiResult<(StatusCode, Json<Dashboard>)> {
    let dashboard = state.dashboard_service.create(space_uuid, body).await?;
    Ok((StatusCode::CREATED, Json(dashboard)))
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Path(dashboard_uuid): Path<Uuid>,
) -> ApiResult<Json<Dashboard>> {
    Ok(Json(state.dashboard_service.get(dashboard_uuid).await?))
}

pub async fn update_dashboard(
    State(state): State<Arc<AppState>>,
    Path(dashboard_uuid): Path<Uuid>,
    Json(body): Json<UpdateDashboard>,
) -> ApiResult<Json<Dashboard>> {
    let dashboard = state.dashboard_service.update(dashboard_uuid, body).await?;
    Ok(Json(dashboard))
}

pub async fn delete_dashboard(
    State(state): State<Arc<AppState>>,
    Path(dashboard_uuid): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.dashboard_service.delete(dashboard_uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_dashboard_version(
    State(state): State<Arc<AppState>>,
    Path(dashboard_uuid): Path<Uuid>,
    Json(body): Json<DashboardVersion>,
) -> ApiResult<(StatusCode, Json<Dashboard>)> {
    let dashboard = state
        .dashboard_service
        .add_version(dashboard_uuid, body)
        .await?;
    Ok((StatusCode::CREATED, Json(dashboard)))
}
