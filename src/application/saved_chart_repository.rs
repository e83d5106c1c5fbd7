// Repository trait for saved chart persistence
use crate::application::error::Result;
use crate::domain::saved_chart::{
    CreateSavedChart, SavedChart, SavedChartSummary, SavedChartVersion, UpdateSavedChart,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SavedChartRepository: Send + Sync {
    /// Current version of a chart, assembled from all of its child tables
    async fn get_by_uuid(&self, chart_uuid: Uuid) -> Result<SavedChart>;

    /// Charts in any space of a project, with their latest version timestamp
    async fn list_by_project(&self, project_uuid: Uuid) -> Result<Vec<SavedChartSummary>>;

    /// Create a chart and its first version in the project's space
    async fn create(&self, project_uuid: Uuid, chart: CreateSavedChart) -> Result<SavedChart>;

    /// Append a new version; earlier versions are left untouched
    async fn add_version(&self, chart_uuid: Uuid, version: SavedChartVersion)
    -> Result<SavedChart>;

    /// Update unversioned fields in place
    async fn update(&self, chart_uuid: Uuid, update: UpdateSavedChart) -> Result<SavedChart>;

    async fn delete(&self, chart_uuid: Uuid) -> Result<()>;
}
