// Application state for HTTP handlers
use crate::application::dashboard_service::DashboardService;
use crate::application::saved_chart_service::SavedChartService;
use crate::application::space_service::SpaceService;

#[derive(Clone)]
pub struct AppState {
    pub space_service: SpaceService,
    pub saved_chart_service: SavedChartService,
    pub dashboard_service: DashboardService,
}
