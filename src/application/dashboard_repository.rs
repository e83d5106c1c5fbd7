// Repository trait for dashboard persistence
use crate::application::error::Result;
use crate::domain::dashboard::{
    CreateDashboard, Dashboard, DashboardSummary, DashboardVersion, UpdateDashboard,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// One summary per dashboard in the project, without tiles
    async fn list_by_project(&self, project_uuid: Uuid) -> Result<Vec<DashboardSummary>>;

    /// Current version of a dashboard with all of its tiles
    async fn get_by_uuid(&self, dashboard_uuid: Uuid) -> Result<Dashboard>;

    /// Create a dashboard and its first version in a space
    async fn create(&self, space_uuid: Uuid, dashboard: CreateDashboard) -> Result<Dashboard>;

    async fn add_version(&self, dashboard_uuid: Uuid, version: DashboardVersion)
    -> Result<Dashboard>;

    async fn update(&self, dashboard_uuid: Uuid, update: UpdateDashboard) -> Result<Dashboard>;

    async fn delete(&self, dashboard_uuid: Uuid) -> Result<()>;
}
