// SQLite connection pool and schema management
use crate::infrastructure::config::DatabaseSettings;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Open the configured database and make sure every table exists.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let parent = options.get_filename().parent();
    if let Some(dir) = parent.filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    info!(max_connections = settings.max_connections, "Opening database");
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database (every extra connection would see an empty database).
#[cfg(test)]
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Fixed-width UTC timestamp so that text ordering matches time ordering.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Bind variables SQLite accepts in one statement on every supported build.
const MAX_BIND_VARIABLES: usize = 999;

/// Rows that fit in one statement when each row binds `binds_per_row` values.
pub fn rows_per_statement(binds_per_row: usize) -> usize {
    (MAX_BIND_VARIABLES / binds_per_row.max(1)).max(1)
}

const SCHEMA: &[&str] = &[
    SCHEMA_PROJECTS,
    SCHEMA_SPACES,
    SCHEMA_SAVED_QUERIES,
    SCHEMA_SAVED_QUERIES_VERSIONS,
    INDEX_SAVED_QUERIES_VERSIONS_LATEST,
    SCHEMA_SAVED_QUERIES_VERSION_FIELDS,
    SCHEMA_SAVED_QUERIES_VERSION_SORTS,
    SCHEMA_SAVED_QUERIES_VERSION_Y_METRICS,
    SCHEMA_SAVED_QUERIES_VERSION_TABLE_CALCULATIONS,
    SCHEMA_DASHBOARDS,
    SCHEMA_DASHBOARD_VERSIONS,
    INDEX_DASHBOARD_VERSIONS_LATEST,
    SCHEMA_DASHBOARD_TILES,
    SCHEMA_DASHBOARD_TILE_CHARTS,
    SCHEMA_DASHBOARD_TILE_MARKDOWNS,
    SCHEMA_DASHBOARD_TILE_LOOMS,
];

// === Containers ===

const SCHEMA_PROJECTS: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    project_id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

const SCHEMA_SPACES: &str = r#"
CREATE TABLE IF NOT EXISTS spaces (
    space_id INTEGER PRIMARY KEY AUTOINCREMENT,
    space_uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    project_id INTEGER NOT NULL REFERENCES projects (project_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
)
"#;

// === Saved queries ===

const SCHEMA_SAVED_QUERIES: &str = r#"
CREATE TABLE IF NOT EXISTS saved_queries (
    saved_query_id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_query_uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    space_id INTEGER NOT NULL REFERENCES spaces (space_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
)
"#;

const SCHEMA_SAVED_QUERIES_VERSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS saved_queries_versions (
    saved_queries_version_id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_queries_version_uuid TEXT NOT NULL UNIQUE,
    saved_query_id INTEGER NOT NULL REFERENCES saved_queries (saved_query_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    explore_name TEXT NOT NULL,
    row_limit INTEGER NOT NULL,
    filters TEXT NOT NULL,
    chart_type TEXT NOT NULL,
    x_dimension TEXT,
    group_dimension TEXT
)
"#;

const INDEX_SAVED_QUERIES_VERSIONS_LATEST: &str = r#"
CREATE INDEX IF NOT EXISTS idx_saved_queries_versions_latest
    ON saved_queries_versions (saved_query_id, created_at DESC)
"#;

const SCHEMA_SAVED_QUERIES_VERSION_FIELDS: &str = r#"
CREATE TABLE IF NOT EXISTS saved_queries_version_fields (
    saved_queries_version_field_id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_queries_version_id INTEGER NOT NULL
        REFERENCES saved_queries_versions (saved_queries_version_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    field_type TEXT NOT NULL,
    "order" INTEGER NOT NULL
)
"#;

const SCHEMA_SAVED_QUERIES_VERSION_SORTS: &str = r#"
CREATE TABLE IF NOT EXISTS saved_queries_version_sorts (
    saved_queries_version_sort_id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_queries_version_id INTEGER NOT NULL
        REFERENCES saved_queries_versions (saved_queries_version_id) ON DELETE CASCADE,
    field_name TEXT NOT NULL,
    descending BOOLEAN NOT NULL,
    "order" INTEGER NOT NULL
)
"#;

const SCHEMA_SAVED_QUERIES_VERSION_Y_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS saved_queries_version_y_metrics (
    saved_queries_version_y_metric_id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_queries_version_id INTEGER NOT NULL
        REFERENCES saved_queries_versions (saved_queries_version_id) ON DELETE CASCADE,
    field_name TEXT NOT NULL,
    "order" INTEGER NOT NULL
)
"#;

const SCHEMA_SAVED_QUERIES_VERSION_TABLE_CALCULATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS saved_queries_version_table_calculations (
    saved_queries_version_table_calculations_id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_queries_version_id INTEGER NOT NULL
        REFERENCES saved_queries_versions (saved_queries_version_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    calculation_raw_sql TEXT NOT NULL,
    "order" INTEGER NOT NULL
)
"#;

// === Dashboards ===

const SCHEMA_DASHBOARDS: &str = r#"
CREATE TABLE IF NOT EXISTS dashboards (
    dashboard_id INTEGER PRIMARY KEY AUTOINCREMENT,
    dashboard_uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    space_id INTEGER NOT NULL REFERENCES spaces (space_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
)
"#;

const SCHEMA_DASHBOARD_VERSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS dashboard_versions (
    dashboard_version_id INTEGER PRIMARY KEY AUTOINCREMENT,
    dashboard_id INTEGER NOT NULL REFERENCES dashboards (dashboard_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
)
"#;

const INDEX_DASHBOARD_VERSIONS_LATEST: &str = r#"
CREATE INDEX IF NOT EXISTS idx_dashboard_versions_latest
    ON dashboard_versions (dashboard_id, created_at DESC)
"#;

// Tile type is checked in code on read so unknown tags surface as integrity errors
const SCHEMA_DASHBOARD_TILES: &str = r#"
CREATE TABLE IF NOT EXISTS dashboard_tiles (
    dashboard_version_id INTEGER NOT NULL
        REFERENCES dashboard_versions (dashboard_version_id) ON DELETE CASCADE,
    dashboard_tile_uuid TEXT NOT NULL,
    type TEXT NOT NULL,
    x_offset INTEGER NOT NULL,
    y_offset INTEGER NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    rank INTEGER NOT NULL,
    PRIMARY KEY (dashboard_version_id, dashboard_tile_uuid)
)
"#;

const SCHEMA_DASHBOARD_TILE_CHARTS: &str = r#"
CREATE TABLE IF NOT EXISTS dashboard_tile_charts (
    dashboard_version_id INTEGER NOT NULL,
    dashboard_tile_uuid TEXT NOT NULL,
    saved_chart_id INTEGER NOT NULL REFERENCES saved_queries (saved_query_id) ON DELETE CASCADE,
    PRIMARY KEY (dashboard_version_id, dashboard_tile_uuid),
    FOREIGN KEY (dashboard_version_id, dashboard_tile_uuid)
        REFERENCES dashboard_tiles (dashboard_version_id, dashboard_tile_uuid) ON DELETE CASCADE
)
"#;

const SCHEMA_DASHBOARD_TILE_MARKDOWNS: &str = r#"
CREATE TABLE IF NOT EXISTS dashboard_tile_markdowns (
    dashboard_version_id INTEGER NOT NULL,
    dashboard_tile_uuid TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    PRIMARY KEY (dashboard_version_id, dashboard_tile_uuid),
    FOREIGN KEY (dashboard_version_id, dashboard_tile_uuid)
        REFERENCES dashboard_tiles (dashboard_version_id, dashboard_tile_uuid) ON DELETE CASCADE
)
"#;

const SCHEMA_DASHBOARD_TILE_LOOMS: &str = r#"
CREATE TABLE IF NOT EXISTS dashboard_tile_looms (
    dashboard_version_id INTEGER NOT NULL,
    dashboard_tile_uuid TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    PRIMARY KEY (dashboard_version_id, dashboard_tile_uuid),
    FOREIGN KEY (dashboard_version_id, dashboard_tile_uuid)
        REFERENCES dashboard_tiles (dashboard_version_id, dashboard_tile_uuid) ON DELETE CASCADE
)
"#;
