// SQLite repository for versioned saved charts
use crate::application::error::{Result, StoreError};
use crate::application::saved_chart_repository::SavedChartRepository;
use crate::domain::saved_chart::{
    ChartConfig, ChartType, CreateSavedChart, FieldType, MetricQuery, SavedChart,
    SavedChartSummary, SavedChartVersion, SeriesLayout, SortField, TableCalculation, TableConfig,
    UpdateSavedChart, VersionField, VersionRows, VersionTableCalculation, merge_column_order,
    partition_fields,
};
use crate::infrastructure::database::{now_timestamp, rows_per_statement};
use crate::infrastructure::sqlite_space_repository::{
    parse_uuid, resolve_project_space, resolve_space,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqliteSavedChartRepository {
    pool: SqlitePool,
}

/// Root row joined to its latest version; version columns are NULL when no version exists
#[derive(Debug, sqlx::FromRow)]
struct DbSavedChartDetails {
    saved_query_uuid: String,
    name: String,
    space_uuid: String,
    saved_queries_version_id: Option<i64>,
    saved_queries_version_uuid: Option<String>,
    explore_name: Option<String>,
    filters: Option<String>,
    row_limit: Option<i64>,
    x_dimension: Option<String>,
    group_dimension: Option<String>,
    chart_type: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct DbSavedChartSummary {
    saved_query_uuid: String,
    name: String,
    space_uuid: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct DbField {
    name: String,
    field_type: String,
    order: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct DbSort {
    field_name: String,
    descending: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct DbTableCalculation {
    name: String,
    display_name: String,
    calculation_raw_sql: String,
    order: i64,
}

impl SqliteSavedChartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a version row and every child row of that version.
    ///
    /// Runs on the caller's transaction. Child tables are written one after
    /// another with chunked multi-row inserts; the commit is the barrier, so
    /// a failure in any of them leaves no trace of the version.
    async fn create_version(
        conn: &mut SqliteConnection,
        saved_query_id: i64,
        version: &SavedChartVersion,
    ) -> Result<i64> {
        let filters = serde_json::to_string(&version.metric_query.filters)?;
        let layout = &version.chart_config.series_layout;

        let version_id = sqlx::query(
            r#"
            INSERT INTO saved_queries_versions
                (saved_queries_version_uuid, saved_query_id, created_at, explore_name,
                 row_limit, filters, chart_type, x_dimension, group_dimension)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(saved_query_id)
        .bind(now_timestamp())
        .bind(&version.table_name)
        .bind(version.metric_query.limit)
        .bind(filters)
        .bind(version.chart_config.chart_type.as_str())
        .bind(layout.x_dimension.as_deref())
        .bind(layout.group_dimension.as_deref())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        let rows = VersionRows::plan(version);

        for batch in rows.fields.chunks(rows_per_statement(4)) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                r#"INSERT INTO saved_queries_version_fields (saved_queries_version_id, name, field_type, "order") "#,
            );
            insert.push_values(batch, |mut row, field| {
                row.push_bind(version_id)
                    .push_bind(field.name.clone())
                    .push_bind(field.field_type.as_str())
                    .push_bind(field.order);
            });
            insert.build().execute(&mut *conn).await?;
        }

        for batch in rows.sorts.chunks(rows_per_statement(4)) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                r#"INSERT INTO saved_queries_version_sorts (saved_queries_version_id, field_name, descending, "order") "#,
            );
            insert.push_values(batch, |mut row, (sort, order)| {
                row.push_bind(version_id)
                    .push_bind(sort.field_id.clone())
                    .push_bind(sort.descending)
                    .push_bind(*order);
            });
            insert.build().execute(&mut *conn).await?;
        }

        for batch in rows.y_metrics.chunks(rows_per_statement(3)) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                r#"INSERT INTO saved_queries_version_y_metrics (saved_queries_version_id, field_name, "order") "#,
            );
            insert.push_values(batch, |mut row, (field_name, order)| {
                row.push_bind(version_id)
                    .push_bind(field_name.clone())
                    .push_bind(*order);
            });
            insert.build().execute(&mut *conn).await?;
        }

        for batch in rows.table_calculations.chunks(rows_per_statement(5)) {
            let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
                r#"INSERT INTO saved_queries_version_table_calculations
                    (saved_queries_version_id, name, display_name, calculation_raw_sql, "order") "#,
            );
            insert.push_values(batch, |mut row, calc| {
                row.push_bind(version_id)
                    .push_bind(calc.calculation.name.clone())
                    .push_bind(calc.calculation.display_name.clone())
                    .push_bind(calc.calculation.sql.clone())
                    .push_bind(calc.order);
            });
            insert.build().execute(&mut *conn).await?;
        }

        debug!(
            saved_query_id,
            version_id,
            fields = rows.fields.len(),
            sorts = rows.sorts.len(),
            y_metrics = rows.y_metrics.len(),
            table_calculations = rows.table_calculations.len(),
            "Saved chart version written"
        );
        Ok(version_id)
    }

    async fn find_id(conn: &mut SqliteConnection, chart_uuid: Uuid) -> Result<i64> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT saved_query_id FROM saved_queries WHERE saved_query_uuid = ?1")
                .bind(chart_uuid.to_string())
                .fetch_optional(&mut *conn)
                .await?;
        id.ok_or_else(|| StoreError::not_found("saved chart", chart_uuid))
    }

    async fn fetch_y_metrics(&self, version_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar(
            r#"SELECT field_name FROM saved_queries_version_y_metrics
               WHERE saved_queries_version_id = ?1 ORDER BY "order" ASC, saved_queries_version_y_metric_id ASC"#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn fetch_fields(&self, version_id: i64) -> Result<Vec<VersionField>> {
        let rows = sqlx::query_as::<_, DbField>(
            r#"SELECT name, field_type, "order" FROM saved_queries_version_fields
               WHERE saved_queries_version_id = ?1 ORDER BY "order" ASC, saved_queries_version_field_id ASC"#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let field_type = FieldType::parse(&row.field_type).ok_or_else(|| {
                    StoreError::unexpected(format!(
                        "saved chart field type \"{}\" not recognised",
                        row.field_type
                    ))
                })?;
                Ok(VersionField {
                    name: row.name,
                    field_type,
                    order: row.order,
                })
            })
            .collect()
    }

    async fn fetch_sorts(&self, version_id: i64) -> Result<Vec<SortField>> {
        let rows = sqlx::query_as::<_, DbSort>(
            r#"SELECT field_name, descending FROM saved_queries_version_sorts
               WHERE saved_queries_version_id = ?1 ORDER BY "order" ASC, saved_queries_version_sort_id ASC"#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SortField {
                field_id: row.field_name,
                descending: row.descending,
            })
            .collect())
    }

    async fn fetch_table_calculations(&self, version_id: i64) -> Result<Vec<VersionTableCalculation>> {
        let rows = sqlx::query_as::<_, DbTableCalculation>(
            r#"SELECT name, display_name, calculation_raw_sql, "order"
               FROM saved_queries_version_table_calculations
               WHERE saved_queries_version_id = ?1"#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        let mut calculations: Vec<VersionTableCalculation> = rows
            .into_iter()
            .map(|row| VersionTableCalculation {
                calculation: TableCalculation {
                    name: row.name,
                    display_name: row.display_name,
                    sql: row.calculation_raw_sql,
                },
                order: row.order,
            })
            .collect();
        calculations.sort_by_key(|calc| calc.order);
        Ok(calculations)
    }
}

#[async_trait]
impl SavedChartRepository for SqliteSavedChartRepository {
    async fn get_by_uuid(&self, chart_uuid: Uuid) -> Result<SavedChart> {
        let details = sqlx::query_as::<_, DbSavedChartDetails>(
            r#"
            SELECT q.saved_query_uuid, q.name, s.space_uuid,
                   v.saved_queries_version_id, v.saved_queries_version_uuid, v.explore_name,
                   v.filters, v.row_limit, v.x_dimension, v.group_dimension, v.chart_type,
                   v.created_at
            FROM saved_queries q
            JOIN spaces s ON s.space_id = q.space_id
            LEFT JOIN saved_queries_versions v ON v.saved_query_id = q.saved_query_id
            WHERE q.saved_query_uuid = ?1
            ORDER BY v.created_at DESC, v.saved_queries_version_id DESC
            LIMIT 1
            "#,
        )
        .bind(chart_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("saved chart", chart_uuid))?;

        let Some(version_id) = details.saved_queries_version_id else {
            warn!(chart_uuid = %chart_uuid, "Saved chart has no versions");
            return Err(StoreError::not_found("saved chart version", chart_uuid));
        };

        let (y_metrics, fields, sorts, table_calculations) = futures::try_join!(
            self.fetch_y_metrics(version_id),
            self.fetch_fields(version_id),
            self.fetch_sorts(version_id),
            self.fetch_table_calculations(version_id),
        )?;

        debug!(chart_uuid = %chart_uuid, version_id, "Saved chart loaded");
        assemble(details, y_metrics, fields, sorts, table_calculations)
    }

    async fn list_by_project(&self, project_uuid: Uuid) -> Result<Vec<SavedChartSummary>> {
        let rows = sqlx::query_as::<_, DbSavedChartSummary>(
            r#"
            SELECT q.saved_query_uuid, q.name, s.space_uuid, v.created_at
            FROM saved_queries q
            JOIN spaces s ON s.space_id = q.space_id
            JOIN projects p ON p.project_id = s.project_id
            JOIN saved_queries_versions v ON v.saved_queries_version_id = (
                SELECT latest.saved_queries_version_id
                FROM saved_queries_versions latest
                WHERE latest.saved_query_id = q.saved_query_id
                ORDER BY latest.created_at DESC, latest.saved_queries_version_id DESC
                LIMIT 1
            )
            WHERE p.project_uuid = ?1
            ORDER BY q.saved_query_id
            "#,
        )
        .bind(project_uuid.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SavedChartSummary {
                    uuid: parse_uuid(&row.saved_query_uuid)?,
                    name: row.name,
                    space_uuid: parse_uuid(&row.space_uuid)?,
                    updated_at: row.created_at,
                })
            })
            .collect()
    }

    async fn create(&self, project_uuid: Uuid, chart: CreateSavedChart) -> Result<SavedChart> {
        let chart_uuid = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        let written = async {
            let space_id = resolve_project_space(&mut *tx, project_uuid).await?;
            let saved_query_id = sqlx::query(
                "INSERT INTO saved_queries (saved_query_uuid, name, space_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(chart_uuid.to_string())
            .bind(&chart.name)
            .bind(space_id)
            .bind(now_timestamp())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            Self::create_version(&mut *tx, saved_query_id, &chart.version).await
        }
        .await;

        match written {
            Ok(_) => tx.commit().await?,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        }

        // read back so the response reflects what was persisted
        self.get_by_uuid(chart_uuid).await
    }

    async fn add_version(
        &self,
        chart_uuid: Uuid,
        version: SavedChartVersion,
    ) -> Result<SavedChart> {
        let mut tx = self.pool.begin().await?;
        let written = async {
            let saved_query_id = Self::find_id(&mut *tx, chart_uuid).await?;
            Self::create_version(&mut *tx, saved_query_id, &version).await
        }
        .await;

        match written {
            Ok(_) => tx.commit().await?,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        }

        self.get_by_uuid(chart_uuid).await
    }

    async fn update(&self, chart_uuid: Uuid, update: UpdateSavedChart) -> Result<SavedChart> {
        let mut tx = self.pool.begin().await?;
        let saved_query_id = Self::find_id(&mut *tx, chart_uuid).await?;

        if let Some(name) = &update.name {
            sqlx::query("UPDATE saved_queries SET name = ?1 WHERE saved_query_id = ?2")
                .bind(name)
                .bind(saved_query_id)
                .execute(&mut *tx)
                .await?;
        }
        if let Some(space_uuid) = update.space_uuid {
            let space_id = resolve_space(&mut *tx, space_uuid).await?;
            sqlx::query("UPDATE saved_queries SET space_id = ?1 WHERE saved_query_id = ?2")
                .bind(space_id)
                .bind(saved_query_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.get_by_uuid(chart_uuid).await
    }

    async fn delete(&self, chart_uuid: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM saved_queries WHERE saved_query_uuid = ?1")
            .bind(chart_uuid.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("saved chart", chart_uuid));
        }
        Ok(())
    }
}

fn assemble(
    details: DbSavedChartDetails,
    y_metrics: Vec<String>,
    fields: Vec<VersionField>,
    sorts: Vec<SortField>,
    table_calculations: Vec<VersionTableCalculation>,
) -> Result<SavedChart> {
    let missing = |column: &str| {
        StoreError::unexpected(format!(
            "saved chart {} version is missing {}",
            details.saved_query_uuid, column
        ))
    };

    let chart_type_tag = details.chart_type.as_deref().ok_or_else(|| missing("chart_type"))?;
    let chart_type = ChartType::parse(chart_type_tag).ok_or_else(|| {
        StoreError::unexpected(format!("chart type \"{}\" not recognised", chart_type_tag))
    })?;
    let filters = match details.filters.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::Value::Null,
    };
    let version_uuid = details
        .saved_queries_version_uuid
        .as_deref()
        .ok_or_else(|| missing("saved_queries_version_uuid"))
        .and_then(parse_uuid)?;
    let table_name = details.explore_name.clone().ok_or_else(|| missing("explore_name"))?;
    let limit = details.row_limit.ok_or_else(|| missing("row_limit"))?;
    let updated_at = details.created_at.ok_or_else(|| missing("created_at"))?;

    let column_order = merge_column_order(&fields, &table_calculations);
    let (dimensions, metrics) = partition_fields(&fields);

    Ok(SavedChart {
        uuid: parse_uuid(&details.saved_query_uuid)?,
        name: details.name,
        space_uuid: parse_uuid(&details.space_uuid)?,
        version_uuid,
        table_name,
        updated_at,
        metric_query: MetricQuery {
            dimensions,
            metrics,
            filters,
            sorts,
            limit,
            table_calculations: table_calculations
                .into_iter()
                .map(|calc| calc.calculation)
                .collect(),
        },
        chart_config: ChartConfig {
            chart_type,
            series_layout: SeriesLayout {
                x_dimension: details.x_dimension,
                group_dimension: details.group_dimension,
                y_metrics,
            },
        },
        table_config: TableConfig { column_order },
    })
}
