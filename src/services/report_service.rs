//! Custom report service - saved definitions and dynamic query construction.
//!
//! Reports run against a fixed allow-list of tables. Identifiers (table,
//! column, aggregate, operator, direction) can never be bound as SQL
//! parameters, so they are constrained to enumerations and a strict
//! identifier syntax validated when a definition is saved. Every *value*
//! position uses a genuine bound placeholder.

use std::collections::HashMap;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::report::{
    FilterOperator, FilterPredicate, ReportDefinition, ReportExecution, ReportRunResponse,
    ReportableTable, SaveReportRequest, TableColumn,
};
use crate::services::audit_service;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::types::{BigDecimal, Json};
use sqlx::{Column, Row, TypeInfo};
use uuid::Uuid;

/// Row cap applied to every report query unless overridden by an explicit
/// `limit` runtime parameter.
pub const DEFAULT_ROW_LIMIT: i64 = 1000;

/// Tables available for reporting, with human-readable labels.
///
/// This enumeration is the primary injection boundary: a table name outside
/// it fails closed before any SQL is constructed.
pub const REPORTABLE_TABLES: &[(&str, &str)] = &[
    ("transactions", "Sales Transactions"),
    ("customers", "Customers"),
    ("products", "Products"),
    ("rental_reservations", "Rental Reservations"),
    ("course_enrollments", "Course Enrollments"),
    ("trip_bookings", "Trip Bookings"),
    ("work_orders", "Work Orders"),
    ("orders", "Online Orders"),
    ("staff", "Staff"),
    ("air_fills", "Air Fills"),
];

/// Label for an allow-listed table, or None if the table is not reportable.
pub fn table_label(table: &str) -> Option<&'static str> {
    REPORTABLE_TABLES
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, label)| *label)
}

/// The allow-list in response form.
pub fn reportable_tables() -> Vec<ReportableTable> {
    REPORTABLE_TABLES
        .iter()
        .map(|(name, label)| ReportableTable {
            name: (*name).to_string(),
            label: (*label).to_string(),
        })
        .collect()
}

/// A constructed query: SQL text with `$n` placeholders plus the values to
/// bind, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

/// A value destined for a bound placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
}

/// Validate a definition before it is saved or updated.
///
/// Checks the table allow-list and the identifier syntax of every column,
/// alias, grouping and sort position. Operators, aggregates and directions
/// are already constrained by their typed enumerations at deserialization.
pub fn validate_definition(request: &SaveReportRequest) -> Result<(), AppError> {
    if table_label(&request.table_name).is_none() {
        return Err(AppError::InvalidTable);
    }

    if request.name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Report name is required".to_string(),
        ));
    }

    if request.columns.is_empty() {
        return Err(AppError::InvalidRequest(
            "Report must select at least one column".to_string(),
        ));
    }

    for column in &request.columns {
        require_identifier(&column.name)?;
        require_identifier(&column.alias)?;
    }
    for filter in &request.filters {
        require_identifier(&filter.column)?;
        if filter.operator == FilterOperator::Between {
            if let Some(value) = &filter.value {
                between_bounds(&filter.column, value)?;
            }
        }
    }
    for group in &request.grouping {
        require_identifier(group)?;
    }
    for sort in &request.sorting {
        require_identifier(&sort.column)?;
    }

    Ok(())
}

/// Build the bounded query for a definition plus runtime parameter overrides.
///
/// Runtime parameters are keyed by filter column name and take precedence
/// over the stored literal, enabling parameterized reuse of a saved report.
/// A `limit` parameter overrides the default row cap.
pub fn build_query(
    report: &ReportDefinition,
    parameters: &HashMap<String, JsonValue>,
) -> Result<QuerySpec, AppError> {
    if table_label(&report.table_name).is_none() {
        return Err(AppError::InvalidTable);
    }
    if report.columns.0.is_empty() {
        return Err(AppError::InvalidRequest(
            "Report must select at least one column".to_string(),
        ));
    }

    let select_columns: Vec<String> = report
        .columns
        .0
        .iter()
        .map(|column| match column.aggregate {
            Some(aggregate) => format!(
                "{}({}) AS {}",
                aggregate.as_sql(),
                column.name,
                column.alias
            ),
            None => format!("{} AS {}", column.name, column.alias),
        })
        .collect();

    let mut sql = format!(
        "SELECT {} FROM {}",
        select_columns.join(", "),
        report.table_name
    );
    let mut binds = Vec::new();

    if !report.filters.0.is_empty() {
        let mut clauses = Vec::with_capacity(report.filters.0.len());
        for filter in &report.filters.0 {
            clauses.push(filter_clause(filter, parameters, &mut binds)?);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if !report.grouping.0.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&report.grouping.0.join(", "));
    }

    if !report.sorting.0.is_empty() {
        let order_clauses: Vec<String> = report
            .sorting
            .0
            .iter()
            .map(|sort| format!("{} {}", sort.column, sort.direction.as_sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_clauses.join(", "));
    }

    let limit = resolve_limit(parameters)?;
    sql.push_str(&format!(" LIMIT {}", limit));

    Ok(QuerySpec { sql, binds })
}

/// Translate one filter predicate into a SQL fragment, appending its bound
/// values.
fn filter_clause(
    filter: &FilterPredicate,
    parameters: &HashMap<String, JsonValue>,
    binds: &mut Vec<BindValue>,
) -> Result<String, AppError> {
    let column = &filter.column;
    // Runtime override wins over the stored literal
    let value = parameters.get(column).or(filter.value.as_ref());

    let required = || {
        value.ok_or_else(|| {
            AppError::InvalidRequest(format!("Filter on '{}' requires a value", column))
        })
    };

    let comparison = |op: &str, binds: &mut Vec<BindValue>| -> Result<String, AppError> {
        binds.push(scalar_bind(required()?)?);
        Ok(format!("{} {} ${}", column, op, binds.len()))
    };

    match filter.operator {
        FilterOperator::Equals => comparison("=", binds),
        FilterOperator::NotEquals => comparison("!=", binds),
        FilterOperator::GreaterThan => comparison(">", binds),
        FilterOperator::LessThan => comparison("<", binds),
        FilterOperator::GreaterThanEqual => comparison(">=", binds),
        FilterOperator::LessThanEqual => comparison("<=", binds),
        FilterOperator::Contains => {
            binds.push(BindValue::Text(format!("%{}%", pattern_text(required()?)?)));
            Ok(format!("{} LIKE ${}", column, binds.len()))
        }
        FilterOperator::StartsWith => {
            binds.push(BindValue::Text(format!("{}%", pattern_text(required()?)?)));
            Ok(format!("{} LIKE ${}", column, binds.len()))
        }
        FilterOperator::EndsWith => {
            binds.push(BindValue::Text(format!("%{}", pattern_text(required()?)?)));
            Ok(format!("{} LIKE ${}", column, binds.len()))
        }
        FilterOperator::In => {
            let items: Vec<BindValue> = match required()? {
                JsonValue::Array(items) => items
                    .iter()
                    .map(scalar_bind)
                    .collect::<Result<_, _>>()?,
                // A comma-separated string is split into text members
                JsonValue::String(list) => list
                    .split(',')
                    .map(|part| BindValue::Text(part.trim().to_string()))
                    .collect(),
                other => vec![scalar_bind(other)?],
            };
            if items.is_empty() {
                return Err(AppError::InvalidRequest(format!(
                    "Filter on '{}' requires at least one value",
                    column
                )));
            }
            let mut placeholders = Vec::with_capacity(items.len());
            for item in items {
                binds.push(item);
                placeholders.push(format!("${}", binds.len()));
            }
            Ok(format!("{} IN ({})", column, placeholders.join(", ")))
        }
        FilterOperator::Between => {
            let (min, max) = between_bounds(column, required()?)?;
            binds.push(scalar_bind(min)?);
            let min_placeholder = binds.len();
            binds.push(scalar_bind(max)?);
            Ok(format!(
                "{} BETWEEN ${} AND ${}",
                column,
                min_placeholder,
                binds.len()
            ))
        }
        FilterOperator::IsNull => Ok(format!("{} IS NULL", column)),
        FilterOperator::IsNotNull => Ok(format!("{} IS NOT NULL", column)),
    }
}

/// Extract the `{min, max}` bounds of a between value.
fn between_bounds<'a>(
    column: &str,
    value: &'a JsonValue,
) -> Result<(&'a JsonValue, &'a JsonValue), AppError> {
    let bounds = value.as_object().ok_or_else(|| {
        AppError::InvalidRequest(format!(
            "Filter on '{}' requires an object with min and max",
            column
        ))
    })?;
    match (bounds.get("min"), bounds.get("max")) {
        (Some(min), Some(max)) => Ok((min, max)),
        _ => Err(AppError::InvalidRequest(format!(
            "Filter on '{}' requires an object with min and max",
            column
        ))),
    }
}

/// Convert a scalar JSON value into a bindable value.
fn scalar_bind(value: &JsonValue) -> Result<BindValue, AppError> {
    match value {
        JsonValue::Null => Ok(BindValue::Null),
        JsonValue::Bool(b) => Ok(BindValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(int) = n.as_i64() {
                Ok(BindValue::Int(int))
            } else if let Some(float) = n.as_f64() {
                Ok(BindValue::Float(float))
            } else {
                Err(AppError::InvalidRequest(
                    "Numeric filter value out of range".to_string(),
                ))
            }
        }
        JsonValue::String(s) => Ok(BindValue::Text(s.clone())),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(AppError::InvalidRequest(
            "Filter value must be a scalar".to_string(),
        )),
    }
}

/// Stringify a scalar value for a LIKE pattern.
fn pattern_text(value: &JsonValue) -> Result<String, AppError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        _ => Err(AppError::InvalidRequest(
            "Pattern filter value must be a scalar".to_string(),
        )),
    }
}

/// Resolve the effective row cap.
fn resolve_limit(parameters: &HashMap<String, JsonValue>) -> Result<i64, AppError> {
    let Some(value) = parameters.get("limit") else {
        return Ok(DEFAULT_ROW_LIMIT);
    };
    let parsed = match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(limit) if limit > 0 => Ok(limit),
        _ => Err(AppError::InvalidRequest(
            "limit must be a positive integer".to_string(),
        )),
    }
}

/// Strict identifier syntax for positions that cannot be bound.
fn is_valid_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    identifier.len() <= 64
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn require_identifier(identifier: &str) -> Result<(), AppError> {
    if is_valid_identifier(identifier) {
        Ok(())
    } else {
        Err(AppError::InvalidRequest(format!(
            "Invalid identifier: '{}'",
            identifier
        )))
    }
}

/// Save a new report definition.
pub async fn save_report(
    pool: &DbPool,
    tenant_id: Uuid,
    actor: Uuid,
    request: SaveReportRequest,
) -> Result<ReportDefinition, AppError> {
    validate_definition(&request)?;

    let report = sqlx::query_as::<_, ReportDefinition>(
        r#"
        INSERT INTO custom_reports
            (tenant_id, name, description, table_name, columns, filters,
             grouping, sorting, chart_type, is_public, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(request.name.trim())
    .bind(&request.description)
    .bind(&request.table_name)
    .bind(Json(&request.columns))
    .bind(Json(&request.filters))
    .bind(Json(&request.grouping))
    .bind(Json(&request.sorting))
    .bind(&request.chart_type)
    .bind(request.is_public)
    .bind(actor)
    .fetch_one(pool)
    .await?;

    tracing::info!(report_id = %report.id, name = %report.name, "custom report saved");

    Ok(report)
}

/// Update a definition.
///
/// When `owner` is supplied the update is constrained to reports created by
/// that actor; a mismatch surfaces as `NotFound`.
pub async fn update_report(
    pool: &DbPool,
    tenant_id: Uuid,
    report_id: Uuid,
    owner: Option<Uuid>,
    request: SaveReportRequest,
) -> Result<ReportDefinition, AppError> {
    validate_definition(&request)?;

    let report = sqlx::query_as::<_, ReportDefinition>(
        r#"
        UPDATE custom_reports SET
            name = $1, description = $2, table_name = $3, columns = $4,
            filters = $5, grouping = $6, sorting = $7, chart_type = $8,
            is_public = $9, updated_at = NOW()
        WHERE id = $10 AND tenant_id = $11 AND ($12::uuid IS NULL OR created_by = $12)
        RETURNING *
        "#,
    )
    .bind(request.name.trim())
    .bind(&request.description)
    .bind(&request.table_name)
    .bind(Json(&request.columns))
    .bind(Json(&request.filters))
    .bind(Json(&request.grouping))
    .bind(Json(&request.sorting))
    .bind(&request.chart_type)
    .bind(request.is_public)
    .bind(report_id)
    .bind(tenant_id)
    .bind(owner)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(report)
}

/// Fetch one definition, scoped to the tenant.
pub async fn get_report(
    pool: &DbPool,
    tenant_id: Uuid,
    report_id: Uuid,
) -> Result<Option<ReportDefinition>, AppError> {
    let report = sqlx::query_as::<_, ReportDefinition>(
        "SELECT * FROM custom_reports WHERE id = $1 AND tenant_id = $2",
    )
    .bind(report_id)
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

/// List definitions under the visibility rules.
///
/// With an actor and `include_public`: reports the actor created unioned
/// with public ones. With an actor only: just the actor's. Without an
/// actor: public reports only. This is a visibility filter, not a security
/// boundary — authentication has already happened upstream.
pub async fn get_all_reports(
    pool: &DbPool,
    tenant_id: Uuid,
    actor: Option<Uuid>,
    include_public: bool,
) -> Result<Vec<ReportDefinition>, AppError> {
    let sql = format!(
        "SELECT * FROM custom_reports WHERE {} ORDER BY name",
        visibility_clause(actor.is_some(), include_public)
    );

    let mut query = sqlx::query_as::<_, ReportDefinition>(&sql).bind(tenant_id);
    if let Some(actor) = actor {
        query = query.bind(actor);
    }

    let reports = query.fetch_all(pool).await?;

    Ok(reports)
}

/// WHERE clause implementing the listing visibility rules.
///
/// `$1` is always the tenant; `$2` is the actor whenever one applies. There
/// is deliberately no branch that matches unconditionally: with no actor,
/// only public reports qualify.
fn visibility_clause(has_actor: bool, include_public: bool) -> &'static str {
    match (has_actor, include_public) {
        (true, true) => "tenant_id = $1 AND (created_by = $2 OR is_public = TRUE)",
        (true, false) => "tenant_id = $1 AND created_by = $2",
        (false, _) => "tenant_id = $1 AND is_public = TRUE",
    }
}

/// Hard-delete a definition.
///
/// Execution-history rows cascade with it; nothing else does. When `owner`
/// is supplied the delete is constrained to the owning actor.
pub async fn delete_report(
    pool: &DbPool,
    tenant_id: Uuid,
    report_id: Uuid,
    owner: Option<Uuid>,
    actor: Uuid,
) -> Result<(), AppError> {
    let deleted = sqlx::query(
        r#"
        DELETE FROM custom_reports
        WHERE id = $1 AND tenant_id = $2 AND ($3::uuid IS NULL OR created_by = $3)
        "#,
    )
    .bind(report_id)
    .bind(tenant_id)
    .bind(owner)
    .execute(pool)
    .await?
    .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    audit_service::record(
        pool,
        tenant_id,
        Some(actor),
        "report_deleted",
        "custom_report",
        Some(report_id),
        "Custom report deleted",
    )
    .await?;

    Ok(())
}

/// Run a saved report with runtime parameter overrides.
///
/// # Process
///
/// 1. Load the definition (tenant-scoped); `NotFound` if absent
/// 2. Append an execution audit row — every attempt is recorded, success or
///    failure is not distinguished in the trail
/// 3. Build the bounded query and execute it
///
/// A database failure during execution is caught and returned structurally
/// (`success: false`), never propagated as a raw fault. Construction
/// failures (bad table, missing filter value) are real errors and happen
/// before any query reaches the store.
pub async fn run_report(
    pool: &DbPool,
    tenant_id: Uuid,
    actor: Uuid,
    report_id: Uuid,
    parameters: &HashMap<String, JsonValue>,
) -> Result<ReportRunResponse, AppError> {
    let report = get_report(pool, tenant_id, report_id)
        .await?
        .ok_or(AppError::NotFound)?;

    log_execution(pool, tenant_id, report_id, actor).await?;

    let spec = build_query(&report, parameters)?;

    match execute_query(pool, &spec).await {
        Ok(results) => {
            let row_count = results.len();
            Ok(ReportRunResponse {
                success: true,
                report: Some(report.into()),
                results: Some(results),
                row_count: Some(row_count),
                error: None,
            })
        }
        Err(e) => {
            tracing::error!(report_id = %report_id, "report execution failed: {}", e);
            Ok(ReportRunResponse {
                success: false,
                report: None,
                results: None,
                row_count: None,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Recent execution audit rows for a report.
pub async fn execution_history(
    pool: &DbPool,
    tenant_id: Uuid,
    report_id: Uuid,
) -> Result<Vec<ReportExecution>, AppError> {
    // Confirm the report exists in this tenant before exposing its history
    get_report(pool, tenant_id, report_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let executions = sqlx::query_as::<_, ReportExecution>(
        r#"
        SELECT id, report_id, executed_by, executed_at
        FROM report_executions
        WHERE report_id = $1
        ORDER BY executed_at DESC
        LIMIT 50
        "#,
    )
    .bind(report_id)
    .fetch_all(pool)
    .await?;

    Ok(executions)
}

/// Column metadata for an allow-listed table.
pub async fn table_columns(pool: &DbPool, table: &str) -> Result<Vec<TableColumn>, AppError> {
    if table_label(table).is_none() {
        return Err(AppError::InvalidTable);
    }

    let columns = sqlx::query_as::<_, TableColumn>(
        r#"
        SELECT column_name::text AS name,
               data_type::text AS data_type,
               (is_nullable = 'YES') AS nullable,
               column_default::text AS "default"
        FROM information_schema.columns
        WHERE table_schema = 'public' AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(columns)
}

async fn log_execution(
    pool: &DbPool,
    tenant_id: Uuid,
    report_id: Uuid,
    actor: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO report_executions (report_id, tenant_id, executed_by) VALUES ($1, $2, $3)",
    )
    .bind(report_id)
    .bind(tenant_id)
    .bind(actor)
    .execute(pool)
    .await?;

    Ok(())
}

/// Execute a constructed query, binding each value in placeholder order.
async fn execute_query(pool: &DbPool, spec: &QuerySpec) -> Result<Vec<JsonValue>, sqlx::Error> {
    let mut query = sqlx::query(&spec.sql);
    for bind in &spec.binds {
        query = match bind {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Float(v) => query.bind(*v),
            BindValue::Bool(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.clone()),
            BindValue::Null => query.bind(Option::<String>::None),
        };
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

/// Convert a dynamically-shaped row into a JSON object keyed by column name.
///
/// Report projections are arbitrary, so decoding is driven by the column's
/// Postgres type. Types outside the mapping fall back to text, then null.
fn row_to_json(row: &PgRow) -> JsonValue {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT2" => row
                .try_get::<Option<i16>, _>(index)
                .ok()
                .flatten()
                .map(|v| JsonValue::from(i64::from(v))),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)
                .ok()
                .flatten()
                .map(|v| JsonValue::from(i64::from(v))),
            "INT8" => row
                .try_get::<Option<i64>, _>(index)
                .ok()
                .flatten()
                .map(JsonValue::from),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(index)
                .ok()
                .flatten()
                .map(|v| JsonValue::from(f64::from(v))),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(index)
                .ok()
                .flatten()
                .map(JsonValue::from),
            // Every AVG and any SUM over a NUMERIC column comes back as
            // NUMERIC, which does not decode as String
            "NUMERIC" => row
                .try_get::<Option<BigDecimal>, _>(index)
                .ok()
                .flatten()
                .map(decimal_to_json),
            "BOOL" => row
                .try_get::<Option<bool>, _>(index)
                .ok()
                .flatten()
                .map(JsonValue::from),
            "UUID" => row
                .try_get::<Option<Uuid>, _>(index)
                .ok()
                .flatten()
                .map(|v| JsonValue::String(v.to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(index)
                .ok()
                .flatten()
                .map(|v| JsonValue::String(v.to_rfc3339())),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(index)
                .ok()
                .flatten()
                .map(|v| JsonValue::String(v.to_string())),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(index)
                .ok()
                .flatten()
                .map(|v| JsonValue::String(v.to_string())),
            "JSON" | "JSONB" => row
                .try_get::<Option<JsonValue>, _>(index)
                .ok()
                .flatten(),
            _ => row
                .try_get::<Option<String>, _>(index)
                .ok()
                .flatten()
                .map(JsonValue::String),
        };
        object.insert(column.name().to_string(), value.unwrap_or(JsonValue::Null));
    }
    JsonValue::Object(object)
}

/// Convert an arbitrary-precision NUMERIC into JSON.
///
/// Values representable as a finite f64 become JSON numbers; anything beyond
/// that range is kept as its exact decimal text rather than losing it.
fn decimal_to_json(value: BigDecimal) -> JsonValue {
    let text = value.to_string();
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::{Aggregate, ColumnProjection, SortDirection, SortSpec};
    use serde_json::json;

    fn column(name: &str, alias: &str) -> ColumnProjection {
        ColumnProjection {
            name: name.to_string(),
            aggregate: None,
            alias: alias.to_string(),
        }
    }

    fn aggregated(name: &str, aggregate: Aggregate, alias: &str) -> ColumnProjection {
        ColumnProjection {
            name: name.to_string(),
            aggregate: Some(aggregate),
            alias: alias.to_string(),
        }
    }

    fn filter(column: &str, operator: FilterOperator, value: Option<JsonValue>) -> FilterPredicate {
        FilterPredicate {
            column: column.to_string(),
            operator,
            value,
        }
    }

    fn definition(
        table: &str,
        columns: Vec<ColumnProjection>,
        filters: Vec<FilterPredicate>,
        grouping: Vec<String>,
        sorting: Vec<SortSpec>,
    ) -> ReportDefinition {
        ReportDefinition {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "test report".to_string(),
            description: None,
            table_name: table.to_string(),
            columns: Json(columns),
            filters: Json(filters),
            grouping: Json(grouping),
            sorting: Json(sorting),
            chart_type: None,
            is_public: false,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn no_params() -> HashMap<String, JsonValue> {
        HashMap::new()
    }

    #[test]
    fn plain_projection_with_default_limit() {
        let report = definition(
            "customers",
            vec![column("name", "customer_name")],
            vec![],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert_eq!(
            spec.sql,
            "SELECT name AS customer_name FROM customers LIMIT 1000"
        );
        assert!(spec.binds.is_empty());
    }

    #[test]
    fn aggregate_projection_uses_enumerated_function() {
        let report = definition(
            "transactions",
            vec![
                aggregated("total_cents", Aggregate::Sum, "total_sales"),
                aggregated("id", Aggregate::Count, "sale_count"),
            ],
            vec![],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert!(
            spec.sql
                .starts_with("SELECT SUM(total_cents) AS total_sales, COUNT(id) AS sale_count")
        );
    }

    #[test]
    fn equals_filter_binds_stored_literal() {
        let report = definition(
            "customers",
            vec![column("name", "name")],
            vec![filter(
                "customer_type",
                FilterOperator::Equals,
                Some(json!("B2B")),
            )],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert_eq!(
            spec.sql,
            "SELECT name AS name FROM customers WHERE customer_type = $1 LIMIT 1000"
        );
        assert_eq!(spec.binds, vec![BindValue::Text("B2B".to_string())]);
    }

    #[test]
    fn runtime_parameter_overrides_stored_literal() {
        let report = definition(
            "customers",
            vec![column("name", "name")],
            vec![filter(
                "customer_type",
                FilterOperator::Equals,
                Some(json!("B2B")),
            )],
            vec![],
            vec![],
        );
        let params = HashMap::from([("customer_type".to_string(), json!("B2C"))]);
        let spec = build_query(&report, &params).unwrap();
        assert_eq!(spec.binds, vec![BindValue::Text("B2C".to_string())]);
    }

    #[test]
    fn between_filter_binds_both_bounds() {
        let report = definition(
            "products",
            vec![column("name", "name")],
            vec![filter(
                "price",
                FilterOperator::Between,
                Some(json!({ "min": 10, "max": 50 })),
            )],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert!(spec.sql.contains("price BETWEEN $1 AND $2"));
        assert_eq!(spec.binds, vec![BindValue::Int(10), BindValue::Int(50)]);
    }

    #[test]
    fn between_without_bounds_fails_closed() {
        let report = definition(
            "products",
            vec![column("name", "name")],
            vec![filter(
                "price",
                FilterOperator::Between,
                Some(json!({ "min": 10 })),
            )],
            vec![],
            vec![],
        );
        assert!(matches!(
            build_query(&report, &no_params()),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn in_filter_expands_array_values() {
        let report = definition(
            "orders",
            vec![column("id", "id")],
            vec![filter(
                "status",
                FilterOperator::In,
                Some(json!(["paid", "shipped"])),
            )],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert!(spec.sql.contains("status IN ($1, $2)"));
        assert_eq!(
            spec.binds,
            vec![
                BindValue::Text("paid".to_string()),
                BindValue::Text("shipped".to_string()),
            ]
        );
    }

    #[test]
    fn in_filter_splits_comma_separated_string() {
        let report = definition(
            "orders",
            vec![column("id", "id")],
            vec![filter(
                "status",
                FilterOperator::In,
                Some(json!("paid, shipped")),
            )],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert!(spec.sql.contains("status IN ($1, $2)"));
        assert_eq!(
            spec.binds,
            vec![
                BindValue::Text("paid".to_string()),
                BindValue::Text("shipped".to_string()),
            ]
        );
    }

    #[test]
    fn like_patterns_are_bound_with_affixes() {
        let report = definition(
            "customers",
            vec![column("email", "email")],
            vec![
                filter("email", FilterOperator::Contains, Some(json!("dive"))),
                filter("name", FilterOperator::StartsWith, Some(json!("A"))),
                filter("city", FilterOperator::EndsWith, Some(json!("Bay"))),
            ],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert!(spec.sql.contains("email LIKE $1 AND name LIKE $2 AND city LIKE $3"));
        assert_eq!(
            spec.binds,
            vec![
                BindValue::Text("%dive%".to_string()),
                BindValue::Text("A%".to_string()),
                BindValue::Text("%Bay".to_string()),
            ]
        );
    }

    #[test]
    fn null_checks_take_no_binds() {
        let report = definition(
            "customers",
            vec![column("id", "id")],
            vec![
                filter("deleted_at", FilterOperator::IsNull, None),
                filter("email", FilterOperator::IsNotNull, None),
            ],
            vec![],
            vec![],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert!(
            spec.sql
                .contains("WHERE deleted_at IS NULL AND email IS NOT NULL")
        );
        assert!(spec.binds.is_empty());
    }

    #[test]
    fn grouping_and_sorting_are_emitted_in_order() {
        let report = definition(
            "transactions",
            vec![aggregated("total_cents", Aggregate::Sum, "total")],
            vec![],
            vec!["staff_id".to_string()],
            vec![
                SortSpec {
                    column: "total".to_string(),
                    direction: SortDirection::Desc,
                },
                SortSpec {
                    column: "staff_id".to_string(),
                    direction: SortDirection::Asc,
                },
            ],
        );
        let spec = build_query(&report, &no_params()).unwrap();
        assert!(
            spec.sql
                .contains("GROUP BY staff_id ORDER BY total DESC, staff_id ASC LIMIT 1000")
        );
    }

    #[test]
    fn limit_parameter_overrides_default() {
        let report = definition("customers", vec![column("id", "id")], vec![], vec![], vec![]);

        let params = HashMap::from([("limit".to_string(), json!(25))]);
        let spec = build_query(&report, &params).unwrap();
        assert!(spec.sql.ends_with("LIMIT 25"));

        let as_string = HashMap::from([("limit".to_string(), json!("50"))]);
        let spec = build_query(&report, &as_string).unwrap();
        assert!(spec.sql.ends_with("LIMIT 50"));
    }

    #[test]
    fn bad_limit_is_rejected() {
        let report = definition("customers", vec![column("id", "id")], vec![], vec![], vec![]);
        for bad in [json!(0), json!(-5), json!("lots"), json!(true)] {
            let params = HashMap::from([("limit".to_string(), bad)]);
            assert!(matches!(
                build_query(&report, &params),
                Err(AppError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn unlisted_table_fails_before_any_sql_exists() {
        let report = definition(
            "pg_shadow",
            vec![column("usename", "usename")],
            vec![],
            vec![],
            vec![],
        );
        assert!(matches!(
            build_query(&report, &no_params()),
            Err(AppError::InvalidTable)
        ));
    }

    #[test]
    fn missing_filter_value_fails_closed() {
        let report = definition(
            "customers",
            vec![column("id", "id")],
            vec![filter("customer_type", FilterOperator::Equals, None)],
            vec![],
            vec![],
        );
        assert!(matches!(
            build_query(&report, &no_params()),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn allow_list_covers_the_reportable_tables() {
        assert_eq!(REPORTABLE_TABLES.len(), 10);
        assert_eq!(table_label("customers"), Some("Customers"));
        assert_eq!(table_label("air_fills"), Some("Air Fills"));
        assert_eq!(table_label("users"), None);
    }

    #[test]
    fn identifier_syntax_is_strict() {
        assert!(is_valid_identifier("customer_type"));
        assert!(is_valid_identifier("_internal"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1starts_with_digit"));
        assert!(!is_valid_identifier("name; DROP TABLE customers"));
        assert!(!is_valid_identifier("col-name"));
        assert!(!is_valid_identifier(&"x".repeat(65)));
    }

    #[test]
    fn validate_definition_rejects_bad_identifiers() {
        let request = SaveReportRequest {
            name: "sales".to_string(),
            description: None,
            table_name: "transactions".to_string(),
            columns: vec![column("total_cents; --", "total")],
            filters: vec![],
            grouping: vec![],
            sorting: vec![],
            chart_type: None,
            is_public: false,
        };
        assert!(matches!(
            validate_definition(&request),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn validate_definition_rejects_unlisted_table_and_empty_columns() {
        let bad_table = SaveReportRequest {
            name: "sales".to_string(),
            description: None,
            table_name: "users".to_string(),
            columns: vec![column("id", "id")],
            filters: vec![],
            grouping: vec![],
            sorting: vec![],
            chart_type: None,
            is_public: false,
        };
        assert!(matches!(
            validate_definition(&bad_table),
            Err(AppError::InvalidTable)
        ));

        let no_columns = SaveReportRequest {
            name: "sales".to_string(),
            description: None,
            table_name: "transactions".to_string(),
            columns: vec![],
            filters: vec![],
            grouping: vec![],
            sorting: vec![],
            chart_type: None,
            is_public: false,
        };
        assert!(matches!(
            validate_definition(&no_columns),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn listing_unions_own_reports_with_public_ones() {
        assert_eq!(
            visibility_clause(true, true),
            "tenant_id = $1 AND (created_by = $2 OR is_public = TRUE)"
        );
    }

    #[test]
    fn listing_without_public_is_own_reports_only() {
        let clause = visibility_clause(true, false);
        assert_eq!(clause, "tenant_id = $1 AND created_by = $2");
        assert!(!clause.contains("is_public"));
    }

    #[test]
    fn listing_without_actor_never_reaches_private_reports() {
        // Other actors' private reports must not qualify on either branch:
        // no actor means the created_by disjunct disappears entirely
        for include_public in [true, false] {
            let clause = visibility_clause(false, include_public);
            assert_eq!(clause, "tenant_id = $1 AND is_public = TRUE");
            assert!(!clause.contains("created_by"));
        }
    }

    #[test]
    fn numeric_values_decode_to_json_numbers() {
        use std::str::FromStr;

        let avg = BigDecimal::from_str("123.4500000000000000").unwrap();
        assert_eq!(decimal_to_json(avg), json!(123.45));

        let negative = BigDecimal::from_str("-0.5").unwrap();
        assert_eq!(decimal_to_json(negative), json!(-0.5));

        let whole = BigDecimal::from_str("42").unwrap();
        assert_eq!(decimal_to_json(whole), json!(42.0));
    }

    #[test]
    fn numeric_values_beyond_f64_keep_exact_text() {
        use std::str::FromStr;

        let huge = BigDecimal::from_str("1e400").unwrap();
        match decimal_to_json(huge) {
            JsonValue::String(text) => assert!(text.starts_with('1')),
            other => panic!("expected exact text, got {other:?}"),
        }
    }
}
