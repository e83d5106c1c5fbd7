// SQLite repository for versioned dashboards and their tiles
use crate::application::dashboard_repository::DashboardRepository;
use crate::application::error::{Result, StoreError};
use crate::domain::dashboard::{
    CreateDashboard, Dashboard, DashboardSummary, DashboardTile, DashboardTileType,
    DashboardVersion, TileProperties, UpdateDashboard,
};
use crate::infrastructure::database::{now_timestamp, rows_per_statement};
use crate::infrastructure::sqlite_space_repository::{parse_uuid, resolve_space};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqliteDashboardRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct DbDashboardDetails {
    dashboard_uuid: String,
    name: String,
    description: Option<String>,
    space_uuid: String,
    dashboard_version_id: Option<i64>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct DbDashboardSummary {
    dashboard_uuid: String,
    name: String,
    description: Option<String>,
    space_uuid: String,
    created_at: DateTime<Utc>,
}

/// A tile left-joined against all three detail tables; at most one side matches
#[derive(Debug, sqlx::FromRow)]
struct DbTile {
    dashboard_tile_uuid: String,
    #[sqlx(rename = "type")]
    tile_type: String,
    x_offset: i64,
    y_offset: i64,
    width: i64,
    height: i64,
    saved_query_uuid: Option<String>,
    markdown_title: Option<String>,
    content: Option<String>,
    loom_title: Option<String>,
    url: Option<String>,
}

impl DbTile {
    fn into_tile(self) -> Result<DashboardTile> {
        let tile_type = DashboardTileType::parse(&self.tile_type).ok_or_else(|| {
            StoreError::unexpected(format!(
                "dashboard tile type \"{}\" not recognised",
                self.tile_type
            ))
        })?;
        let missing_detail = || {
            StoreError::unexpected(format!(
                "dashboard tile {} has no {} detail row",
                self.dashboard_tile_uuid, tile_type
            ))
        };

        let properties = match tile_type {
            // a chart tile without a detail row has no chart attached
            DashboardTileType::SavedChart => TileProperties::SavedChart {
                saved_chart_uuid: self.saved_query_uuid.as_deref().map(parse_uuid).transpose()?,
            },
            DashboardTileType::Markdown => match (&self.markdown_title, &self.content) {
                (Some(title), Some(content)) => TileProperties::Markdown {
                    title: title.clone(),
                    content: content.clone(),
                },
                _ => return Err(missing_detail()),
            },
            DashboardTileType::Loom => match (&self.loom_title, &self.url) {
                (Some(title), Some(url)) => TileProperties::Loom {
                    title: title.clone(),
                    url: url.clone(),
                },
                _ => return Err(missing_detail()),
            },
        };

        Ok(DashboardTile {
            uuid: parse_uuid(&self.dashboard_tile_uuid)?,
            x: self.x_offset,
            y: self.y_offset,
            w: self.width,
            h: self.height,
            properties,
        })
    }
}

impl SqliteDashboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a version row, its tiles and one detail row per tile.
    ///
    /// Runs on the caller's transaction. Each table is written with chunked
    /// multi-row inserts on that one connection, and the commit is the barrier
    /// for all of them: nothing is visible until it succeeds.
    async fn create_version(
        conn: &mut SqliteConnection,
        dashboard_id: i64,
        version: DashboardVersion,
    ) -> Result<i64> {
        let version_id = sqlx::query(
            "INSERT INTO dashboard_versions (dashboard_id, created_at) VALUES (?1, ?2)",
        )
        .bind(dashboard_id)
        .bind(now_timestamp())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        let tiles: Vec<DashboardTile> = version
            .tiles
            .into_iter()
            .map(|tile| tile.into_tile())
            .collect();
        if tiles.is_empty() {
            return Ok(version_id);
        }

        let chart_ids = Self::resolve_chart_ids(&mut *conn, &tiles).await?;

        let per_insert = rows_per_statement(8);
        for (batch_index, batch) in tiles.chunks(per_insert).enumerate() {
            let first_rank = batch_index * per_insert;
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO dashboard_tiles \
                 (dashboard_version_id, dashboard_tile_uuid, type, x_offset, y_offset, width, height, rank) ",
            );
            insert.push_values(batch.iter().enumerate(), |mut row, (offset, tile)| {
                row.push_bind(version_id)
                    .push_bind(tile.uuid.to_string())
                    .push_bind(tile.properties.tile_type().as_str())
                    .push_bind(tile.x)
                    .push_bind(tile.y)
                    .push_bind(tile.w)
                    .push_bind(tile.h)
                    .push_bind((first_rank + offset) as i64);
            });
            insert.build().execute(&mut *conn).await?;
        }

        let mut charts = Vec::new();
        let mut markdowns = Vec::new();
        let mut looms = Vec::new();
        for tile in &tiles {
            match &tile.properties {
                TileProperties::SavedChart {
                    saved_chart_uuid: Some(chart_uuid),
                } => {
                    let chart_id = chart_ids
                        .get(chart_uuid)
                        .copied()
                        .ok_or_else(|| StoreError::not_found("saved chart", chart_uuid))?;
                    charts.push((tile.uuid, chart_id))
                }
                TileProperties::SavedChart {
                    saved_chart_uuid: None,
                } => {}
                TileProperties::Markdown { title, content } => {
                    markdowns.push((tile.uuid, title.clone(), content.clone()))
                }
                TileProperties::Loom { title, url } => {
                    looms.push((tile.uuid, title.clone(), url.clone()))
                }
            }
        }

        for batch in charts.chunks(rows_per_statement(3)) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO dashboard_tile_charts (dashboard_version_id, dashboard_tile_uuid, saved_chart_id) ",
            );
            insert.push_values(batch, |mut row, (tile_uuid, chart_id)| {
                row.push_bind(version_id)
                    .push_bind(tile_uuid.to_string())
                    .push_bind(*chart_id);
            });
            insert.build().execute(&mut *conn).await?;
        }

        for batch in markdowns.chunks(rows_per_statement(4)) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO dashboard_tile_markdowns (dashboard_version_id, dashboard_tile_uuid, title, content) ",
            );
            insert.push_values(batch, |mut row, (tile_uuid, title, content)| {
                row.push_bind(version_id)
                    .push_bind(tile_uuid.to_string())
                    .push_bind(title.clone())
                    .push_bind(content.clone());
            });
            insert.build().execute(&mut *conn).await?;
        }

        for batch in looms.chunks(rows_per_statement(4)) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO dashboard_tile_looms (dashboard_version_id, dashboard_tile_uuid, title, url) ",
            );
            insert.push_values(batch, |mut row, (tile_uuid, title, url)| {
                row.push_bind(version_id)
                    .push_bind(tile_uuid.to_string())
                    .push_bind(title.clone())
                    .push_bind(url.clone());
            });
            insert.build().execute(&mut *conn).await?;
        }

        debug!(
            dashboard_id,
            version_id,
            tiles = tiles.len(),
            charts = charts.len(),
            markdowns = markdowns.len(),
            looms = looms.len(),
            "Dashboard version written"
        );
        Ok(version_id)
    }

    /// Map every chart uuid referenced by the tiles to its internal id.
    async fn resolve_chart_ids(
        conn: &mut SqliteConnection,
        tiles: &[DashboardTile],
    ) -> Result<HashMap<Uuid, i64>> {
        let wanted: BTreeSet<Uuid> = tiles
            .iter()
            .filter_map(|tile| match tile.properties {
                TileProperties::SavedChart { saved_chart_uuid } => saved_chart_uuid,
                _ => None,
            })
            .collect();
        if wanted.is_empty() {
            return Ok(HashMap::new());
        }

        let ordered: Vec<Uuid> = wanted.iter().copied().collect();
        let mut found = HashMap::with_capacity(ordered.len());
        for batch in ordered.chunks(rows_per_statement(1)) {
            let mut select: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT saved_query_uuid, saved_query_id FROM saved_queries WHERE saved_query_uuid IN (",
            );
            let mut separated = select.separated(", ");
            for chart_uuid in batch {
                separated.push_bind(chart_uuid.to_string());
            }
            separated.push_unseparated(")");

            let rows: Vec<(String, i64)> = select.build_query_as().fetch_all(&mut *conn).await?;
            for (chart_uuid, chart_id) in rows {
                found.insert(parse_uuid(&chart_uuid)?, chart_id);
            }
        }

        match wanted.iter().find(|chart_uuid| !found.contains_key(*chart_uuid)) {
            Some(missing) => Err(StoreError::not_found("saved chart", missing)),
            None => Ok(found),
        }
    }

    async fn find_id(conn: &mut SqliteConnection, dashboard_uuid: Uuid) -> Result<i64> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT dashboard_id FROM dashboards WHERE dashboard_uuid = ?1")
                .bind(dashboard_uuid.to_string())
                .fetch_optional(&mut *conn)
                .await?;
        id.ok_or_else(|| StoreError::not_found("dashboard", dashboard_uuid))
    }

    async fn fetch_tiles(&self, version_id: i64) -> Result<Vec<DashboardTile>> {
        let rows = sqlx::query_as::<_, DbTile>(
            r#"
            SELECT t.dashboard_tile_uuid, t.type, t.x_offset, t.y_offset, t.width, t.height,
                   q.saved_query_uuid,
                   m.title AS markdown_title, m.content,
                   l.title AS loom_title, l.url
            FROM dashboard_tiles t
            LEFT JOIN dashboard_tile_charts c
                ON c.dashboard_tile_uuid = t.dashboard_tile_uuid
               AND c.dashboard_version_id = t.dashboard_version_id
            LEFT JOIN dashboard_tile_markdowns m
                ON m.dashboard_tile_uuid = t.dashboard_tile_uuid
               AND m.dashboard_version_id = t.dashboard_version_id
            LEFT JOIN dashboard_tile_looms l
                ON l.dashboard_tile_uuid = t.dashboard_tile_uuid
               AND l.dashboard_version_id = t.dashboard_version_id
            LEFT JOIN saved_queries q ON q.saved_query_id = c.saved_chart_id
            WHERE t.dashboard_version_id = ?1
            ORDER BY t.rank ASC
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DbTile::into_tile).collect()
    }
}

#[async_trait]
impl DashboardRepository for SqliteDashboardRepository {
    async fn list_by_project(&self, project_uuid: Uuid) -> Result<Vec<DashboardSummary>> {
        let rows = sqlx::query_as::<_, DbDashboardSummary>(
            r#"
            SELECT d.dashboard_uuid, d.name, d.description, s.space_uuid, v.created_at
            FROM dashboards d
            JOIN spaces s ON s.space_id = d.space_id
            JOIN projects p ON p.project_id = s.project_id
            JOIN dashboard_versions v ON v.dashboard_version_id = (
                SELECT latest.dashboard_version_id
                FROM dashboard_versions latest
                WHERE latest.dashboard_id = d.dashboard_id
                ORDER BY latest.created_at DESC, latest.dashboard_version_id DESC
                LIMIT 1
            )
            WHERE p.project_uuid = ?1
            ORDER BY d.dashboard_id
            "#,
        )
        .bind(project_uuid.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DashboardSummary {
                    uuid: parse_uuid(&row.dashboard_uuid)?,
                    name: row.name,
                    description: row.description,
                    space_uuid: parse_uuid(&row.space_uuid)?,
                    updated_at: row.created_at,
                })
            })
            .collect()
    }

    async fn get_by_uuid(&self, dashboard_uuid: Uuid) -> Result<Dashboard> {
        let details = sqlx::query_as::<_, DbDashboardDetails>(
            r#"
            SELECT d.dashboard_uuid, d.name, d.description, s.space_uuid,
                   v.dashboard_version_id, v.created_at
            FROM dashboards d
            JOIN spaces s ON s.space_id = d.space_id
            LEFT JOIN dashboard_versions v ON v.dashboard_id = d.dashboard_id
            WHERE d.dashboard_uuid = ?1
            ORDER BY v.created_at DESC, v.dashboard_version_id DESC
            LIMIT 1
            "#,
        )
        .bind(dashboard_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("dashboard", dashboard_uuid))?;

        let (Some(version_id), Some(updated_at)) = (details.dashboard_version_id, details.created_at)
        else {
            warn!(dashboard_uuid = %dashboard_uuid, "Dashboard has no versions");
            return Err(StoreError::not_found("dashboard version", dashboard_uuid));
        };

        let tiles = self.fetch_tiles(version_id).await?;
        debug!(dashboard_uuid = %dashboard_uuid, version_id, tiles = tiles.len(), "Dashboard loaded");

        Ok(Dashboard {
            uuid: parse_uuid(&details.dashboard_uuid)?,
            name: details.name,
            description: details.description,
            space_uuid: parse_uuid(&details.space_uuid)?,
            updated_at,
            tiles,
        })
    }

    async fn create(&self, space_uuid: Uuid, dashboard: CreateDashboard) -> Result<Dashboard> {
        let dashboard_uuid = Uuid::new_v4();
        let version = dashboard.version();

        let mut tx = self.pool.begin().await?;
        let written = async {
            let space_id = resolve_space(&mut *tx, space_uuid).await?;
            let dashboard_id = sqlx::query(
                "INSERT INTO dashboards (dashboard_uuid, name, description, space_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(dashboard_uuid.to_string())
            .bind(&dashboard.name)
            .bind(dashboard.description.as_deref())
            .bind(space_id)
            .bind(now_timestamp())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            Self::create_version(&mut *tx, dashboard_id, version).await
        }
        .await;

        match written {
            Ok(_) => tx.commit().await?,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        }

        self.get_by_uuid(dashboard_uuid).await
    }

    async fn add_version(
        &self,
        dashboard_uuid: Uuid,
        version: DashboardVersion,
    ) -> Result<Dashboard> {
        let mut tx = self.pool.begin().await?;
        let written = async {
            let dashboard_id = Self::find_id(&mut *tx, dashboard_uuid).await?;
            Self::create_version(&mut *tx, dashboard_id, version).await
        }
        .await;

        match written {
            Ok(_) => tx.commit().await?,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        }

        self.get_by_uuid(dashboard_uuid).await
    }

    async fn update(&self, dashboard_uuid: Uuid, update: UpdateDashboard) -> Result<Dashboard> {
        let mut tx = self.pool.begin().await?;
        let dashboard_id = Self::find_id(&mut *tx, dashboard_uuid).await?;

        if let Some(name) = &update.name {
            sqlx::query("UPDATE dashboards SET name = ?1 WHERE dashboard_id = ?2")
                .bind(name)
                .bind(dashboard_id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(description) = &update.description {
            sqlx::query("UPDATE dashboards SET description = ?1 WHERE dashboard_id = ?2")
                .bind(description.as_deref())
                .bind(dashboard_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.get_by_uuid(dashboard_uuid).await
    }

    async fn delete(&self, dashboard_uuid: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM dashboards WHERE dashboard_uuid = ?1")
            .bind(dashboard_uuid.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("dashboard", dashboard_uuid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::saved_chart_repository::SavedChartRepository;
    use crate::application::space_repository::SpaceRepository;
    use crate::domain::dashboard::CreateDashboardTile;
    use crate::domain::saved_chart::{
        ChartConfig, ChartType, CreateSavedChart, MetricQuery, SavedChartVersion, SeriesLayout,
        TableConfig,
    };
    use crate::domain::space::Project;
    use crate::infrastructure::database::connect_in_memory;
    use crate::infrastructure::sqlite_saved_chart_repository::SqliteSavedChartRepository;
    use crate::infrastructure::sqlite_space_repository::SqliteSpaceRepository;
    use std::time::Duration;

    async fn setup() -> (SqliteDashboardRepository, SqlitePool, Project) {
        let pool = connect_in_memory().await.unwrap();
        let project = SqliteSpaceRepository::new(pool.clone())
            .create_project("Jaffle shop")
            .await
            .unwrap();
        (SqliteDashboardRepository::new(pool.clone()), pool, project)
    }

    async fn save_chart(pool: &SqlitePool, project: &Project) -> Uuid {
        let chart = CreateSavedChart {
            name: "Orders".to_string(),
            version: SavedChartVersion {
                table_name: "orders".to_string(),
                metric_query: MetricQuery {
                    dimensions: vec!["status".to_string()],
                    metrics: vec!["order_count".to_string()],
                    filters: serde_json::json!({}),
                    sorts: vec![],
                    limit: 100,
                    table_calculations: vec![],
                },
                chart_config: ChartConfig {
                    chart_type: ChartType::Bar,
                    series_layout: SeriesLayout {
                        x_dimension: Some("status".to_string()),
                        group_dimension: None,
                        y_metrics: vec!["order_count".to_string()],
                    },
                },
                table_config: TableConfig {
                    column_order: vec![],
                },
            },
        };
        SqliteSavedChartRepository::new(pool.clone())
            .create(project.uuid, chart)
            .await
            .unwrap()
            .uuid
    }

    fn tile(x: i64, y: i64, properties: TileProperties) -> CreateDashboardTile {
        CreateDashboardTile {
            uuid: None,
            x,
            y,
            w: 6,
            h: 3,
            properties,
        }
    }

    fn markdown(title: &str, content: &str) -> TileProperties {
        TileProperties::Markdown {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    fn dashboard(tiles: Vec<CreateDashboardTile>) -> CreateDashboard {
        CreateDashboard {
            name: "Weekly KPIs".to_string(),
            description: Some("Numbers for the Monday sync".to_string()),
            tiles,
        }
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_markdown_tile_round_trip() {
        let (repo, _pool, project) = setup().await;
        let notes = CreateDashboardTile {
            uuid: None,
            x: 4,
            y: 5,
            w: 200,
            h: 100,
            properties: markdown("Notes", "hello"),
        };

        let created = repo
            .create(project.spaces[0].uuid, dashboard(vec![notes]))
            .await
            .unwrap();
        let loaded = repo.get_by_uuid(created.uuid).await.unwrap();

        assert_eq!(created, loaded);
        assert_eq!(loaded.space_uuid, project.spaces[0].uuid);
        assert_eq!(loaded.description.as_deref(), Some("Numbers for the Monday sync"));
        assert_eq!(loaded.tiles.len(), 1);
        let tile = &loaded.tiles[0];
        assert_eq!((tile.x, tile.y, tile.w, tile.h), (4, 5, 200, 100));
        assert_eq!(tile.properties.tile_type(), DashboardTileType::Markdown);
        assert_eq!(tile.properties, markdown("Notes", "hello"));
    }

    #[tokio::test]
    async fn test_all_tile_kinds_keep_their_order() {
        let (repo, pool, project) = setup().await;
        let chart_uuid = save_chart(&pool, &project).await;
        let loom_uuid = Uuid::new_v4();

        let tiles = vec![
            tile(
                0,
                0,
                TileProperties::SavedChart {
                    saved_chart_uuid: Some(chart_uuid),
                },
            ),
            CreateDashboardTile {
                uuid: Some(loom_uuid),
                ..tile(
                    6,
                    0,
                    TileProperties::Loom {
                        title: "Walkthrough".to_string(),
                        url: "https://www.loom.com/share/abc".to_string(),
                    },
                )
            },
            tile(0, 3, markdown("Notes", "see the walkthrough")),
            tile(
                6,
                3,
                TileProperties::SavedChart {
                    saved_chart_uuid: None,
                },
            ),
        ];

        let created = repo
            .create(project.spaces[0].uuid, dashboard(tiles))
            .await
            .unwrap();

        let kinds: Vec<DashboardTileType> = created
            .tiles
            .iter()
            .map(|t| t.properties.tile_type())
            .collect();
        assert_eq!(
            kinds,
            vec![
                DashboardTileType::SavedChart,
                DashboardTileType::Loom,
                DashboardTileType::Markdown,
                DashboardTileType::SavedChart,
            ]
        );
        assert_eq!(
            created.tiles[0].properties,
            TileProperties::SavedChart {
                saved_chart_uuid: Some(chart_uuid)
            }
        );
        assert_eq!(created.tiles[1].uuid, loom_uuid);
        assert_eq!(
            created.tiles[3].properties,
            TileProperties::SavedChart {
                saved_chart_uuid: None
            }
        );
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tile_charts").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tile_looms").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tile_markdowns").await, 1);
    }

    #[tokio::test]
    async fn test_add_version_becomes_current() {
        let (repo, pool, project) = setup().await;
        let created = repo
            .create(
                project.spaces[0].uuid,
                dashboard(vec![tile(0, 0, markdown("Old", "first"))]),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2)).await;
        let updated = repo
            .add_version(
                created.uuid,
                DashboardVersion {
                    tiles: vec![
                        tile(0, 0, markdown("New", "second")),
                        tile(6, 0, markdown("Extra", "third")),
                    ],
                },
            )
            .await
            .unwrap();

        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.tiles.len(), 2);
        assert_eq!(updated.tiles[0].properties, markdown("New", "second"));
        assert_eq!(updated.name, created.name);
        // previous versions are kept
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_versions").await, 2);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tiles").await, 3);
    }

    #[tokio::test]
    async fn test_empty_version_has_no_tiles() {
        let (repo, _pool, project) = setup().await;
        let created = repo
            .create(project.spaces[0].uuid, dashboard(vec![]))
            .await
            .unwrap();

        assert!(created.tiles.is_empty());
        assert!(repo.get_by_uuid(created.uuid).await.unwrap().tiles.is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (repo, pool, project) = setup().await;
        let created = repo
            .create(
                project.spaces[0].uuid,
                dashboard(vec![tile(0, 0, markdown("Notes", "hello"))]),
            )
            .await
            .unwrap();

        repo.delete(created.uuid).await.unwrap();

        assert!(repo.get_by_uuid(created.uuid).await.unwrap_err().is_not_found());
        assert!(repo.delete(created.uuid).await.unwrap_err().is_not_found());
        for table in [
            "dashboards",
            "dashboard_versions",
            "dashboard_tiles",
            "dashboard_tile_markdowns",
        ] {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            assert_eq!(count(&pool, &sql).await, 0, "{} not emptied", table);
        }
    }

    #[tokio::test]
    async fn test_deleted_chart_leaves_empty_chart_tile() {
        let (repo, pool, project) = setup().await;
        let chart_uuid = save_chart(&pool, &project).await;
        let created = repo
            .create(
                project.spaces[0].uuid,
                dashboard(vec![tile(
                    0,
                    0,
                    TileProperties::SavedChart {
                        saved_chart_uuid: Some(chart_uuid),
                    },
                )]),
            )
            .await
            .unwrap();

        SqliteSavedChartRepository::new(pool.clone())
            .delete(chart_uuid)
            .await
            .unwrap();

        let loaded = repo.get_by_uuid(created.uuid).await.unwrap();
        assert_eq!(loaded.tiles.len(), 1);
        assert_eq!(
            loaded.tiles[0].properties,
            TileProperties::SavedChart {
                saved_chart_uuid: None
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_references_roll_back() {
        let (repo, pool, project) = setup().await;

        let err = repo
            .create(Uuid::new_v4(), dashboard(vec![]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let missing_chart = tile(
            0,
            0,
            TileProperties::SavedChart {
                saved_chart_uuid: Some(Uuid::new_v4()),
            },
        );
        let err = repo
            .create(project.spaces[0].uuid, dashboard(vec![missing_chart]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboards").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_versions").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tiles").await, 0);
    }

    #[tokio::test]
    async fn test_failed_add_version_keeps_previous_version() {
        let (repo, pool, project) = setup().await;
        let created = repo
            .create(
                project.spaces[0].uuid,
                dashboard(vec![tile(0, 0, markdown("Notes", "hello"))]),
            )
            .await
            .unwrap();

        let unknown_chart = DashboardVersion {
            tiles: vec![
                tile(0, 0, markdown("Notes", "edited")),
                tile(
                    6,
                    0,
                    TileProperties::SavedChart {
                        saved_chart_uuid: Some(Uuid::new_v4()),
                    },
                ),
            ],
        };
        let err = repo.add_version(created.uuid, unknown_chart).await.unwrap_err();
        assert!(err.is_not_found());

        sqlx::query(
            "CREATE TRIGGER reject_looms BEFORE INSERT ON dashboard_tile_looms \
             BEGIN SELECT RAISE(ABORT, 'loom rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        let rejected_loom = DashboardVersion {
            tiles: vec![
                tile(0, 0, markdown("Notes", "edited")),
                tile(
                    6,
                    0,
                    TileProperties::Loom {
                        title: "Walkthrough".to_string(),
                        url: "https://www.loom.com/share/abc".to_string(),
                    },
                ),
            ],
        };
        let err = repo.add_version(created.uuid, rejected_loom).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_versions").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tiles").await, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tile_markdowns").await, 1);
        assert_eq!(repo.get_by_uuid(created.uuid).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_large_version_is_written_in_chunks() {
        let (repo, pool, project) = setup().await;
        let tiles: Vec<CreateDashboardTile> = (0..4200)
            .map(|i| tile(i, 0, markdown(&format!("Tile {}", i), "body")))
            .collect();

        let created = repo
            .create(project.spaces[0].uuid, dashboard(tiles))
            .await
            .unwrap();

        assert_eq!(created.tiles.len(), 4200);
        assert!(created.tiles.iter().enumerate().all(|(i, t)| t.x == i as i64));
        assert_eq!(created.tiles[4199].properties, markdown("Tile 4199", "body"));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM dashboard_tile_markdowns").await, 4200);
    }

    #[tokio::test]
    async fn test_update_can_clear_description() {
        let (repo, _pool, project) = setup().await;
        let created = repo
            .create(project.spaces[0].uuid, dashboard(vec![]))
            .await
            .unwrap();
        assert!(created.description.is_some());

        let cleared = repo
            .update(
                created.uuid,
                UpdateDashboard {
                    name: None,
                    description: Some(None),
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.name, created.name);

        let set = repo
            .update(
                created.uuid,
                UpdateDashboard {
                    name: None,
                    description: Some(Some("Quarterly".to_string())),
                },
            )
            .await
            .unwrap();
        assert_eq!(set.description.as_deref(), Some("Quarterly"));
    }

    #[tokio::test]
    async fn test_unknown_dashboard_is_not_found() {
        let (repo, _pool, _project) = setup().await;
        let unknown = Uuid::new_v4();

        assert!(repo.get_by_uuid(unknown).await.unwrap_err().is_not_found());
        assert!(
            repo.add_version(unknown, DashboardVersion::default())
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            repo.update(unknown, UpdateDashboard::default())
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_dashboard_without_versions_is_not_found() {
        let (repo, pool, project) = setup().await;
        let orphan = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO dashboards (dashboard_uuid, name, space_id, created_at) \
             SELECT ?1, 'Orphan', space_id, ?2 FROM spaces WHERE space_uuid = ?3",
        )
        .bind(orphan.to_string())
        .bind(now_timestamp())
        .bind(project.spaces[0].uuid.to_string())
        .execute(&pool)
        .await
        .unwrap();

        let err = repo.get_by_uuid(orphan).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.list_by_project(project.uuid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognised_tile_type_is_unexpected() {
        let (repo, pool, project) = setup().await;
        let created = repo
            .create(
                project.spaces[0].uuid,
                dashboard(vec![tile(0, 0, markdown("Notes", "hello"))]),
            )
            .await
            .unwrap();

        sqlx::query("UPDATE dashboard_tiles SET type = 'iframe'")
            .execute(&pool)
            .await
            .unwrap();

        let err = repo.get_by_uuid(created.uuid).await.unwrap_err();
        assert!(matches!(err, StoreError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_missing_markdown_detail_is_unexpected() {
        let (repo, pool, project) = setup().await;
        let created = repo
            .create(
                project.spaces[0].uuid,
                dashboard(vec![tile(0, 0, markdown("Notes", "hello"))]),
            )
            .await
            .unwrap();

        sqlx::query("DELETE FROM dashboard_tile_markdowns")
            .execute(&pool)
            .await
            .unwrap();

        let err = repo.get_by_uuid(created.uuid).await.unwrap_err();
        assert!(matches!(err, StoreError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_update_and_list() {
        let (repo, _pool, project) = setup().await;
        let first = repo
            .create(project.spaces[0].uuid, dashboard(vec![]))
            .await
            .unwrap();
        let second = repo
            .create(
                project.spaces[0].uuid,
                CreateDashboard {
                    name: "Marketing".to_string(),
                    description: None,
                    tiles: vec![],
                },
            )
            .await
            .unwrap();

        let renamed = repo
            .update(
                first.uuid,
                UpdateDashboard {
                    name: Some("Weekly KPIs (archived)".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Weekly KPIs (archived)");
        assert_eq!(renamed.description, first.description);

        let summaries = repo.list_by_project(project.uuid).await.unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Weekly KPIs (archived)", "Marketing"]);
        assert_eq!(summaries[1].uuid, second.uuid);
        assert_eq!(summaries[1].updated_at, second.updated_at);

        assert!(repo.list_by_project(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
