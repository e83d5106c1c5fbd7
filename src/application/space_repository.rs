// Repository trait for projects and spaces
use crate::application::error::Result;
use crate::domain::space::{Project, Space};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SpaceRepository: Send + Sync {
    /// Create a project together with its default space
    async fn create_project(&self, name: &str) -> Result<Project>;

    async fn create_space(&self, project_uuid: Uuid, name: &str) -> Result<Space>;

    /// Spaces of a project, oldest first
    async fn list_spaces(&self, project_uuid: Uuid) -> Result<Vec<Space>>;
}
