// Dashboard service - Use cases for building and versioning dashboards
use crate::application::dashboard_repository::DashboardRepository;
use crate::application::error::{Result, StoreError};
use crate::application::saved_chart_service::validate_name;
use crate::domain::dashboard::{
    CreateDashboard, CreateDashboardTile, Dashboard, DashboardSummary, DashboardVersion,
    UpdateDashboard,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct DashboardService {
    repository: Arc<dyn DashboardRepository>,
}

impl DashboardService {
    pub fn new(repository: Arc<dyn DashboardRepository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self, project_uuid: Uuid) -> Result<Vec<DashboardSummary>> {
        self.repository.list_by_project(project_uuid).await
    }

    pub async fn get(&self, dashboard_uuid: Uuid) -> Result<Dashboard> {
        self.repository.get_by_uuid(dashboard_uuid).await
    }

    pub async fn create(&self, space_uuid: Uuid, dashboard: CreateDashboard) -> Result<Dashboard> {
        validate_name(&dashboard.name)?;
        validate_tiles(&dashboard.tiles)?;

        let created = self.repository.create(space_uuid, dashboard).await?;
        tracing::info!(
            dashboard_uuid = %created.uuid,
            space_uuid = %space_uuid,
            tiles = created.tiles.len(),
            "Dashboard created"
        );
        Ok(created)
    }

    pub async fn add_version(
        &self,
        dashboard_uuid: Uuid,
        version: DashboardVersion,
    ) -> Result<Dashboard> {
        validate_tiles(&version.tiles)?;

        let dashboard = self.repository.add_version(dashboard_uuid, version).await?;
        tracing::info!(
            dashboard_uuid = %dashboard_uuid,
            tiles = dashboard.tiles.len(),
            "Dashboard version added"
        );
        Ok(dashboard)
    }

    pub async fn update(&self, dashboard_uuid: Uuid, update: UpdateDashboard) -> Result<Dashboard> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        let dashboard = self.repository.update(dashboard_uuid, update).await?;
        tracing::info!(dashboard_uuid = %dashboard_uuid, "Dashboard updated");
        Ok(dashboard)
    }

    pub async fn delete(&self, dashboard_uuid: Uuid) -> Result<()> {
        self.repository.delete(dashboard_uuid).await?;
        tracing::info!(dashboard_uuid = %dashboard_uuid, "Dashboard deleted");
        Ok(())
    }
}

fn validate_tiles(tiles: &[CreateDashboardTile]) -> Result<()> {
    let mut seen = HashSet::new();
    for tile in tiles {
        if tile.x < 0 || tile.y < 0 || tile.w < 0 || tile.h < 0 {
            return Err(StoreError::invalid(
                "tiles",
                format!(
                    "geometry must be non-negative, got x={} y={} w={} h={}",
                    tile.x, tile.y, tile.w, tile.h
                ),
            ));
        }
        if let Some(uuid) = tile.uuid {
            if !seen.insert(uuid) {
                return Err(StoreError::invalid(
                    "tiles",
                    format!("duplicate tile uuid {}", uuid),
                ));
            }
        }
    }
    Ok(())
}
