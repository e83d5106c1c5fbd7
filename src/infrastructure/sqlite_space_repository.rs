// SQLite repository for projects and spaces, plus the container lookups used by the stores
use crate::application::error::{Result, StoreError};
use crate::application::space_repository::SpaceRepository;
use crate::domain::space::{DEFAULT_SPACE_NAME, Project, Space};
use crate::infrastructure::database::now_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqliteSpaceRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct DbSpace {
    space_uuid: String,
    name: String,
    project_uuid: String,
    created_at: DateTime<Utc>,
}

impl DbSpace {
    fn into_space(self) -> Result<Space> {
        Ok(Space {
            uuid: parse_uuid(&self.space_uuid)?,
            name: self.name,
            project_uuid: parse_uuid(&self.project_uuid)?,
            created_at: self.created_at,
        })
    }
}

impl SqliteSpaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_space(
        conn: &mut SqliteConnection,
        project_id: i64,
        name: &str,
    ) -> Result<Uuid> {
        let space_uuid = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO spaces (space_uuid, name, project_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(space_uuid.to_string())
        .bind(name)
        .bind(project_id)
        .bind(now_timestamp())
        .execute(&mut *conn)
        .await?;
        Ok(space_uuid)
    }

    async fn fetch_spaces(conn: &mut SqliteConnection, project_uuid: Uuid) -> Result<Vec<Space>> {
        let rows = sqlx::query_as::<_, DbSpace>(
            r#"
            SELECT s.space_uuid, s.name, p.project_uuid, s.created_at
            FROM spaces s
            JOIN projects p ON p.project_id = s.project_id
            WHERE p.project_uuid = ?1
            ORDER BY s.space_id
            "#,
        )
        .bind(project_uuid.to_string())
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(DbSpace::into_space).collect()
    }
}

#[async_trait]
impl SpaceRepository for SqliteSpaceRepository {
    async fn create_project(&self, name: &str) -> Result<Project> {
        let project_uuid = Uuid::new_v4();
        let created_at = now_timestamp();

        let mut tx = self.pool.begin().await?;
        let project_id = sqlx::query(
            "INSERT INTO projects (project_uuid, name, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(project_uuid.to_string())
        .bind(name)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        Self::insert_space(&mut *tx, project_id, DEFAULT_SPACE_NAME).await?;

        let created_at: DateTime<Utc> =
            sqlx::query_scalar("SELECT created_at FROM projects WHERE project_id = ?1")
                .bind(project_id)
                .fetch_one(&mut *tx)
                .await?;
        let spaces = Self::fetch_spaces(&mut *tx, project_uuid).await?;
        tx.commit().await?;

        Ok(Project {
            uuid: project_uuid,
            name: name.to_string(),
            created_at,
            spaces,
        })
    }

    async fn create_space(&self, project_uuid: Uuid, name: &str) -> Result<Space> {
        let mut tx = self.pool.begin().await?;
        let project_id: Option<i64> =
            sqlx::query_scalar("SELECT project_id FROM projects WHERE project_uuid = ?1")
                .bind(project_uuid.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let project_id = project_id.ok_or_else(|| StoreError::not_found("project", project_uuid))?;

        let space_uuid = Self::insert_space(&mut *tx, project_id, name).await?;
        let space = Self::fetch_spaces(&mut *tx, project_uuid)
            .await?
            .into_iter()
            .find(|space| space.uuid == space_uuid)
            .ok_or_else(|| StoreError::unexpected("space missing after insert"))?;
        tx.commit().await?;

        Ok(space)
    }

    async fn list_spaces(&self, project_uuid: Uuid) -> Result<Vec<Space>> {
        let mut conn = self.pool.acquire().await?;
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT project_id FROM projects WHERE project_uuid = ?1")
                .bind(project_uuid.to_string())
                .fetch_optional(&mut *conn)
                .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("project", project_uuid));
        }
        Self::fetch_spaces(&mut *conn, project_uuid).await
    }
}

/// Internal id of the space that new charts in a project are saved to (its oldest space).
pub async fn resolve_project_space(conn: &mut SqliteConnection, project_uuid: Uuid) -> Result<i64> {
    let space_id: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT s.space_id
        FROM spaces s
        JOIN projects p ON p.project_id = s.project_id
        WHERE p.project_uuid = ?1
        ORDER BY s.space_id
        LIMIT 1
        "#,
    )
    .bind(project_uuid.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    space_id.ok_or_else(|| StoreError::not_found("space", project_uuid))
}

/// Internal id of a space from its external uuid.
pub async fn resolve_space(conn: &mut SqliteConnection, space_uuid: Uuid) -> Result<i64> {
    let space_id: Option<i64> =
        sqlx::query_scalar("SELECT space_id FROM spaces WHERE space_uuid = ?1 LIMIT 1")
            .bind(space_uuid.to_string())
            .fetch_optional(&mut *conn)
            .await?;

    space_id.ok_or_else(|| StoreError::not_found("space", space_uuid))
}

/// Parse a uuid read back from a TEXT column.
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| StoreError::unexpected(format!("stored uuid \"{}\" is malformed: {}", value, e)))
}
