// Saved chart domain model - versioned chart definitions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column position recorded for a field that the caller left out of `columnOrder`.
pub const UNORDERED_COLUMN: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Column,
    Bar,
    Line,
    Scatter,
    Table,
    BigNumber,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Column => "column",
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Scatter => "scatter",
            ChartType::Table => "table",
            ChartType::BigNumber => "big_number",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "column" => Some(ChartType::Column),
            "bar" => Some(ChartType::Bar),
            "line" => Some(ChartType::Line),
            "scatter" => Some(ChartType::Scatter),
            "table" => Some(ChartType::Table),
            "big_number" => Some(ChartType::BigNumber),
            _ => None,
        }
    }
}

/// Kind of a selected field within a chart version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Dimension,
    Metric,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Dimension => "dimension",
            FieldType::Metric => "metric",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dimension" => Some(FieldType::Dimension),
            "metric" => Some(FieldType::Metric),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortField {
    pub field_id: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCalculation {
    pub name: String,
    pub display_name: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQuery {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    #[serde(default)]
    pub filters: serde_json::Value,
    #[serde(default)]
    pub sorts: Vec<SortField>,
    pub limit: i64,
    #[serde(default)]
    pub table_calculations: Vec<TableCalculation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesLayout {
    pub x_dimension: Option<String>,
    pub group_dimension: Option<String>,
    #[serde(default)]
    pub y_metrics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub chart_type: ChartType,
    pub series_layout: SeriesLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub column_order: Vec<String>,
}

/// Content of one immutable chart version, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChartVersion {
    pub table_name: String,
    pub metric_query: MetricQuery,
    pub chart_config: ChartConfig,
    #[serde(default)]
    pub table_config: TableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSavedChart {
    pub name: String,
    #[serde(flatten)]
    pub version: SavedChartVersion,
}

/// Unversioned fields of a chart; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSavedChart {
    pub name: Option<String>,
    pub space_uuid: Option<Uuid>,
}

/// A saved chart as read back from its current version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChart {
    pub uuid: Uuid,
    pub name: String,
    pub space_uuid: Uuid,
    pub version_uuid: Uuid,
    pub table_name: String,
    pub updated_at: DateTime<Utc>,
    pub metric_query: MetricQuery,
    pub chart_config: ChartConfig,
    pub table_config: TableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChartSummary {
    pub uuid: Uuid,
    pub name: String,
    pub space_uuid: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// A dimension or metric stored against a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionField {
    pub name: String,
    pub field_type: FieldType,
    pub order: i64,
}

/// A table calculation stored against a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTableCalculation {
    pub calculation: TableCalculation,
    pub order: i64,
}

/// Every child row of one chart version, with its `order` already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRows {
    pub fields: Vec<VersionField>,
    pub sorts: Vec<(SortField, i64)>,
    pub y_metrics: Vec<(String, i64)>,
    pub table_calculations: Vec<VersionTableCalculation>,
}

/// Position of `name` in the caller-declared column order, or [`UNORDERED_COLUMN`].
pub fn column_position(column_order: &[String], name: &str) -> i64 {
    column_order
        .iter()
        .position(|column| column == name)
        .map(|index| index as i64)
        .unwrap_or(UNORDERED_COLUMN)
}

impl VersionRows {
    /// Derive the child rows for a new version.
    ///
    /// Dimensions, metrics and table calculations share the column-order space
    /// and take their position from `table_config.column_order`. Sorts and y-metrics
    /// are numbered by their position in their own list.
    pub fn plan(version: &SavedChartVersion) -> Self {
        let column_order = &version.table_config.column_order;
        let query = &version.metric_query;

        let dimensions = query.dimensions.iter().map(|name| VersionField {
            name: name.clone(),
            field_type: FieldType::Dimension,
            order: column_position(column_order, name),
        });
        let metrics = query.metrics.iter().map(|name| VersionField {
            name: name.clone(),
            field_type: FieldType::Metric,
            order: column_position(column_order, name),
        });

        Self {
            fields: dimensions.chain(metrics).collect(),
            sorts: query
                .sorts
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, sort)| (sort, index as i64))
                .collect(),
            y_metrics: version
                .chart_config
                .series_layout
                .y_metrics
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, field)| (field, index as i64))
                .collect(),
            table_calculations: query
                .table_calculations
                .iter()
                .map(|calculation| VersionTableCalculation {
                    calculation: calculation.clone(),
                    order: column_position(column_order, &calculation.name),
                })
                .collect(),
        }
    }
}

/// Split fields (already sorted by `order`) into dimensions and metrics.
pub fn partition_fields(fields: &[VersionField]) -> (Vec<String>, Vec<String>) {
    let mut dimensions = Vec::new();
    let mut metrics = Vec::new();
    for field in fields {
        match field.field_type {
            FieldType::Dimension => dimensions.push(field.name.clone()),
            FieldType::Metric => metrics.push(field.name.clone()),
        }
    }
    (dimensions, metrics)
}

/// Rebuild the display column order from fields and table calculations.
///
/// Sorts and y-metrics have their own numbering and never take part.
pub fn merge_column_order(
    fields: &[VersionField],
    table_calculations: &[VersionTableCalculation],
) -> Vec<String> {
    let mut columns: Vec<(i64, &str)> = fields
        .iter()
        .map(|field| (field.order, field.name.as_str()))
        .chain(
            table_calculations
                .iter()
                .map(|calc| (calc.order, calc.calculation.name.as_str())),
        )
        .collect();
    // stable: ties keep fields ahead of calculations
    columns.sort_by_key(|(order, _)| *order);
    columns.into_iter().map(|(_, name)| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(column_order: &[&str]) -> SavedChartVersion {
        SavedChartVersion {
            table_name: "orders".to_string(),
            metric_query: MetricQuery {
                dimensions: vec!["region".to_string(), "country".to_string()],
                metrics: vec!["revenue".to_string()],
                filters: serde_json::json!({}),
                sorts: vec![
                    SortField {
                        field_id: "revenue".to_string(),
                        descending: true,
                    },
                    SortField {
                        field_id: "region".to_string(),
                        descending: false,
                    },
                ],
                limit: 500,
                table_calculations: vec![TableCalculation {
                    name: "share".to_string(),
                    display_name: "Share".to_string(),
                    sql: "${revenue} / 100".to_string(),
                }],
            },
            chart_config: ChartConfig {
                chart_type: ChartType::Column,
                series_layout: SeriesLayout {
                    x_dimension: Some("region".to_string()),
                    group_dimension: None,
                    y_metrics: vec!["share".to_string(), "revenue".to_string()],
                },
            },
            table_config: TableConfig {
                column_order: column_order.iter().map(|c| c.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_column_position_missing_name_is_minus_one() {
        let order = vec!["a".to_string(), "b".to_string()];
        assert_eq!(column_position(&order, "b"), 1);
        assert_eq!(column_position(&order, "c"), UNORDERED_COLUMN);
        assert_eq!(column_position(&[], "a"), -1);
    }

    #[test]
    fn test_plan_uses_column_order_for_fields_and_calculations() {
        let rows = VersionRows::plan(&version(&["share", "revenue", "country", "region"]));

        let orders: Vec<(&str, i64)> = rows
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.order))
            .collect();
        assert_eq!(orders, vec![("region", 3), ("country", 2), ("revenue", 1)]);
        assert_eq!(rows.table_calculations[0].order, 0);
    }

    #[test]
    fn test_plan_numbers_sorts_and_y_metrics_by_position() {
        let rows = VersionRows::plan(&version(&["share", "revenue", "country", "region"]));

        assert_eq!(rows.sorts[0].0.field_id, "revenue");
        assert_eq!(rows.sorts[0].1, 0);
        assert_eq!(rows.sorts[1].1, 1);
        assert_eq!(
            rows.y_metrics,
            vec![("share".to_string(), 0), ("revenue".to_string(), 1)]
        );
    }

    #[test]
    fn test_merge_column_order_round_trips_declared_order() {
        let rows = VersionRows::plan(&version(&["country", "share", "region", "revenue"]));
        let columns = merge_column_order(&rows.fields, &rows.table_calculations);
        assert_eq!(columns, vec!["country", "share", "region", "revenue"]);
    }

    #[test]
    fn test_merge_column_order_puts_undeclared_columns_first() {
        // current behaviour: a field missing from columnOrder is stored at -1
        let rows = VersionRows::plan(&version(&["region", "share"]));
        let columns = merge_column_order(&rows.fields, &rows.table_calculations);
        assert_eq!(columns, vec!["country", "revenue", "region", "share"]);
    }

    #[test]
    fn test_partition_fields_keeps_relative_order() {
        let fields = vec![
            VersionField {
                name: "revenue".to_string(),
                field_type: FieldType::Metric,
                order: 0,
            },
            VersionField {
                name: "region".to_string(),
                field_type: FieldType::Dimension,
                order: 1,
            },
            VersionField {
                name: "orders".to_string(),
                field_type: FieldType::Metric,
                order: 2,
            },
        ];
        let (dimensions, metrics) = partition_fields(&fields);
        assert_eq!(dimensions, vec!["region"]);
        assert_eq!(metrics, vec!["revenue", "orders"]);
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(ChartType::parse("big_number"), Some(ChartType::BigNumber));
        assert_eq!(ChartType::parse("pie"), None);
        assert_eq!(FieldType::parse(FieldType::Metric.as_str()), Some(FieldType::Metric));
        assert_eq!(
            serde_json::to_value(ChartType::BigNumber).unwrap(),
            serde_json::json!("big_number")
        );
    }

    #[test]
    fn test_create_request_flattens_version() {
        let body = serde_json::json!({
            "name": "Revenue by region",
            "tableName": "orders",
            "metricQuery": {
                "dimensions": ["region"],
                "metrics": ["revenue"],
                "filters": {},
                "sorts": [{"fieldId": "revenue", "descending": true}],
                "limit": 500,
                "tableCalculations": []
            },
            "chartConfig": {
                "chartType": "column",
                "seriesLayout": {"xDimension": "region", "yMetrics": ["revenue"]}
            },
            "tableConfig": {"columnOrder": ["region", "revenue"]}
        });

        let create: CreateSavedChart = serde_json::from_value(body).unwrap();
        assert_eq!(create.name, "Revenue by region");
        assert_eq!(create.version.table_name, "orders");
        assert_eq!(create.version.chart_config.series_layout.group_dimension, None);
        assert_eq!(create.version.table_config.column_order, vec!["region", "revenue"]);
    }
}
