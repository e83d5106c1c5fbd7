// Space service - Use cases for projects and their spaces
use crate::application::error::Result;
use crate::application::saved_chart_service::validate_name;
use crate::application::space_repository::SpaceRepository;
use crate::domain::space::{Project, Space};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SpaceService {
    repository: Arc<dyn SpaceRepository>,
}

impl SpaceService {
    pub fn new(repository: Arc<dyn SpaceRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_project(&self, name: &str) -> Result<Project> {
        validate_name(name)?;
        let project = self.repository.create_project(name.trim()).await?;
        tracing::info!(project_uuid = %project.uuid, "Project created");
        Ok(project)
    }

    pub async fn create_space(&self, project_uuid: Uuid, name: &str) -> Result<Space> {
        validate_name(name)?;
        let space = self.repository.create_space(project_uuid, name.trim()).await?;
        tracing::info!(space_uuid = %space.uuid, project_uuid = %project_uuid, "Space created");
        Ok(space)
    }

    pub async fn list_spaces(&self, project_uuid: Uuid) -> Result<Vec<Space>> {
        self.repository.list_spaces(project_uuid).await
    }
}
