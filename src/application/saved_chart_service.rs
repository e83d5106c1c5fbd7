// Saved chart service - Use cases for creating and versioning charts
use crate::application::error::{Result, StoreError};
use crate::application::saved_chart_repository::SavedChartRepository;
use crate::domain::saved_chart::{
    CreateSavedChart, SavedChart, SavedChartSummary, SavedChartVersion, UpdateSavedChart,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SavedChartService {
    repository: Arc<dyn SavedChartRepository>,
}

impl SavedChartService {
    pub fn new(repository: Arc<dyn SavedChartRepository>) -> Self {
        Self { repository }
    }

    pub async fn get(&self, chart_uuid: Uuid) -> Result<SavedChart> {
        self.repository.get_by_uuid(chart_uuid).await
    }

    pub async fn list(&self, project_uuid: Uuid) -> Result<Vec<SavedChartSummary>> {
        self.repository.list_by_project(project_uuid).await
    }

    pub async fn create(&self, project_uuid: Uuid, chart: CreateSavedChart) -> Result<SavedChart> {
        validate_name(&chart.name)?;
        validate_version(&chart.version)?;

        let saved = self.repository.create(project_uuid, chart).await?;
        tracing::info!(
            chart_uuid = %saved.uuid,
            project_uuid = %project_uuid,
            table = %saved.table_name,
            "Saved chart created"
        );
        Ok(saved)
    }

    pub async fn add_version(
        &self,
        chart_uuid: Uuid,
        version: SavedChartVersion,
    ) -> Result<SavedChart> {
        validate_version(&version)?;

        let saved = self.repository.add_version(chart_uuid, version).await?;
        tracing::info!(
            chart_uuid = %chart_uuid,
            version_uuid = %saved.version_uuid,
            "Saved chart version added"
        );
        Ok(saved)
    }

    pub async fn update(&self, chart_uuid: Uuid, update: UpdateSavedChart) -> Result<SavedChart> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        let saved = self.repository.update(chart_uuid, update).await?;
        tracing::info!(chart_uuid = %chart_uuid, "Saved chart updated");
        Ok(saved)
    }

    pub async fn delete(&self, chart_uuid: Uuid) -> Result<()> {
        self.repository.delete(chart_uuid).await?;
        tracing::info!(chart_uuid = %chart_uuid, "Saved chart deleted");
        Ok(())
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::invalid("name", "must not be blank"));
    }
    Ok(())
}

fn validate_version(version: &SavedChartVersion) -> Result<()> {
    if version.table_name.trim().is_empty() {
        return Err(StoreError::invalid("tableName", "must not be blank"));
    }
    if version.metric_query.limit <= 0 {
        return Err(StoreError::invalid(
            "metricQuery.limit",
            format!("must be positive, got {}", version.metric_query.limit),
        ));
    }
    Ok(())
}
