//! Report definition models and API request/response types.
//!
//! A report definition is a saved, parameterized specification of a query:
//! target table, column projections, filter predicates, grouping and sorting.
//! Every enumerated piece (aggregate functions, filter operators, sort
//! directions) is a typed enum, so an unknown value is rejected when the
//! definition is saved rather than silently degrading at execution time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use uuid::Uuid;

/// Aggregate functions permitted in column projections.
///
/// The SQL token is derived from the enum, never from user-supplied text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_sql(self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Count => "COUNT",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// One column of the SELECT clause.
///
/// Emitted as `AGGREGATE(name) AS alias` when an aggregate is declared,
/// otherwise `name AS alias`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProjection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    pub alias: String,
}

/// Fixed enumeration of filter operators.
///
/// An operator outside this set fails deserialization, so it can neither be
/// saved nor executed — there is no always-true fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanEqual,
    LessThanEqual,
    Contains,
    StartsWith,
    EndsWith,
    In,
    Between,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    /// Whether this operator consumes a value at execution time.
    pub fn needs_value(self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

/// One filter predicate of the WHERE clause.
///
/// The stored `value` acts as a default; a runtime parameter keyed by the
/// filter's column name overrides it, enabling parameterized reuse of a
/// saved report. Predicates are joined with AND.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
}

/// Sort direction, constrained to ASC/DESC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One `column direction` pair of the ORDER BY clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Represents a saved report definition from the database.
///
/// # Database Table
///
/// Maps to the `custom_reports` table. Clause lists are stored as JSONB and
/// decoded into their typed forms on load. Each definition belongs to one
/// tenant and is owned by the actor that created it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportDefinition {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Target table; must be a member of the reporting allow-list
    pub table_name: String,

    pub columns: Json<Vec<ColumnProjection>>,
    pub filters: Json<Vec<FilterPredicate>>,
    pub grouping: Json<Vec<String>>,
    pub sorting: Json<Vec<SortSpec>>,

    /// Optional chart-type hint for the rendering layer
    pub chart_type: Option<String>,

    /// Public reports are visible to every actor in the tenant
    pub is_public: bool,

    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for saving or updating a report definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveReportRequest {
    pub name: String,
    pub description: Option<String>,
    pub table_name: String,
    pub columns: Vec<ColumnProjection>,
    #[serde(default)]
    pub filters: Vec<FilterPredicate>,
    #[serde(default)]
    pub grouping: Vec<String>,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    pub chart_type: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Report definition as returned to API clients.
#[derive(Debug, Serialize)]
pub struct ReportDefinitionResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub table_name: String,
    pub columns: Vec<ColumnProjection>,
    pub filters: Vec<FilterPredicate>,
    pub grouping: Vec<String>,
    pub sorting: Vec<SortSpec>,
    pub chart_type: Option<String>,
    pub is_public: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReportDefinition> for ReportDefinitionResponse {
    fn from(report: ReportDefinition) -> Self {
        Self {
            id: report.id,
            name: report.name,
            description: report.description,
            table_name: report.table_name,
            columns: report.columns.0,
            filters: report.filters.0,
            grouping: report.grouping.0,
            sorting: report.sorting.0,
            chart_type: report.chart_type,
            is_public: report.is_public,
            created_by: report.created_by,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

/// Structured result of a report run.
///
/// Execution failures at the store are surfaced here (`success: false`)
/// instead of propagating a raw fault — the caller always receives a
/// structured result.
#[derive(Debug, Serialize)]
pub struct ReportRunResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportDefinitionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report execution audit row.
///
/// Append-only: one row per run attempt, success or failure not
/// distinguished.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ReportExecution {
    pub id: Uuid,
    pub report_id: Uuid,
    pub executed_by: Option<Uuid>,
    pub executed_at: DateTime<Utc>,
}

/// One entry of the reportable-tables listing.
#[derive(Debug, Serialize)]
pub struct ReportableTable {
    pub name: String,
    pub label: String,
}

/// Column metadata for an allow-listed table.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct TableColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}
