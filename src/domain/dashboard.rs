// Dashboard domain model - versioned tile layouts
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Closed set of tile kinds. The stored tag of every tile is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardTileType {
    SavedChart,
    Markdown,
    Loom,
}

impl DashboardTileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardTileType::SavedChart => "saved_chart",
            DashboardTileType::Markdown => "markdown",
            DashboardTileType::Loom => "loom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "saved_chart" => Some(DashboardTileType::SavedChart),
            "markdown" => Some(DashboardTileType::Markdown),
            "loom" => Some(DashboardTileType::Loom),
            _ => None,
        }
    }
}

impl fmt::Display for DashboardTileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload of a tile, serialized as `{"type": ..., "properties": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TileProperties {
    #[serde(rename_all = "camelCase")]
    SavedChart { saved_chart_uuid: Option<Uuid> },
    Markdown { title: String, content: String },
    Loom { title: String, url: String },
}

impl TileProperties {
    pub fn tile_type(&self) -> DashboardTileType {
        match self {
            TileProperties::SavedChart { .. } => DashboardTileType::SavedChart,
            TileProperties::Markdown { .. } => DashboardTileType::Markdown,
            TileProperties::Loom { .. } => DashboardTileType::Loom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardTile {
    pub uuid: Uuid,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    #[serde(flatten)]
    pub properties: TileProperties,
}

/// A tile in a create or version request. A missing uuid is generated on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDashboardTile {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    #[serde(flatten)]
    pub properties: TileProperties,
}

impl CreateDashboardTile {
    pub fn into_tile(self) -> DashboardTile {
        DashboardTile {
            uuid: self.uuid.unwrap_or_else(Uuid::new_v4),
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
            properties: self.properties,
        }
    }
}

/// Versioned content of a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardVersion {
    pub tiles: Vec<CreateDashboardTile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDashboard {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tiles: Vec<CreateDashboardTile>,
}

impl CreateDashboard {
    pub fn version(&self) -> DashboardVersion {
        DashboardVersion {
            tiles: self.tiles.clone(),
        }
    }
}

/// Unversioned dashboard fields; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDashboard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Some(None)` clears the description; an explicit JSON `null` maps to it
    #[serde(
        default,
        deserialize_with = "deserialize_cleared",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

fn deserialize_cleared<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub space_uuid: Uuid,
    pub updated_at: DateTime<Utc>,
    pub tiles: Vec<DashboardTile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub space_uuid: Uuid,
    pub updated_at: DateTime<Utc>,
}
