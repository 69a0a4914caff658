//! Custom report HTTP handlers.
//!
//! This module implements the report-builder API endpoints:
//! - GET /api/v1/reports/tables - Reportable table allow-list
//! - GET /api/v1/reports/tables/{table}/columns - Column metadata
//! - POST /api/v1/reports - Save a report definition
//! - GET /api/v1/reports - List visible definitions
//! - GET /api/v1/reports/{id} - Fetch one definition
//! - PUT /api/v1/reports/{id} - Update a definition
//! - DELETE /api/v1/reports/{id} - Delete a definition
//! - POST /api/v1/reports/{id}/run - Execute with runtime parameters
//! - GET /api/v1/reports/{id}/history - Recent execution audit rows
//!
//! Every handler checks its permission before touching the store, so a
//! denial can never leave a partial side effect.

use std::collections::HashMap;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::report::{
        ReportDefinitionResponse, ReportExecution, ReportRunResponse, ReportableTable,
        SaveReportRequest, TableColumn,
    },
    services::report_service,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Query string for the report listing.
#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    /// Include public reports owned by other actors (default true)
    #[serde(default = "default_include_public")]
    pub include_public: bool,
}

fn default_include_public() -> bool {
    true
}

/// List the reportable tables with their labels.
pub async fn list_tables(
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ReportableTable>>, AppError> {
    auth.require_permission("reports.read")?;

    Ok(Json(report_service::reportable_tables()))
}

/// Column metadata for one allow-listed table.
///
/// Returns 400 for a table outside the allow-list before any catalog query
/// is issued.
pub async fn table_columns(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(table): Path<String>,
) -> Result<Json<Vec<TableColumn>>, AppError> {
    auth.require_permission("reports.read")?;

    let columns = report_service::table_columns(&pool, &table).await?;

    Ok(Json(columns))
}

/// Save a new report definition.
///
/// # Endpoint
///
/// `POST /api/v1/reports`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "B2B customers",
///   "table_name": "customers",
///   "columns": [{ "name": "name", "alias": "customer_name" }],
///   "filters": [{ "column": "customer_type", "operator": "equals", "value": "B2B" }],
///   "sorting": [{ "column": "customer_name", "direction": "asc" }],
///   "is_public": false
/// }
/// ```
///
/// The definition is validated before persistence: table allow-list,
/// identifier syntax, enumerated operators/aggregates/directions.
pub async fn create_report(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SaveReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require_permission("reports.write")?;

    let report =
        report_service::save_report(&pool, auth.tenant_id, auth.api_key_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReportDefinitionResponse::from(report)),
    ))
}

/// List report definitions visible to the caller.
///
/// Returns the caller's own reports, unioned with public ones unless
/// `?include_public=false`. Visibility is a filter, not the security
/// boundary — authentication already happened in the middleware.
pub async fn list_reports(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<Vec<ReportDefinitionResponse>>, AppError> {
    auth.require_permission("reports.read")?;

    let reports = report_service::get_all_reports(
        &pool,
        auth.tenant_id,
        Some(auth.api_key_id),
        query.include_public,
    )
    .await?;

    Ok(Json(reports.into_iter().map(Into::into).collect()))
}

/// Fetch one report definition.
pub async fn get_report(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ReportDefinitionResponse>, AppError> {
    auth.require_permission("reports.read")?;

    let report = report_service::get_report(&pool, auth.tenant_id, report_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(report.into()))
}

/// Update a report definition.
///
/// Constrained to the owning actor unless the caller holds `reports.admin`.
pub async fn update_report(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
    Json(request): Json<SaveReportRequest>,
) -> Result<Json<ReportDefinitionResponse>, AppError> {
    auth.require_permission("reports.write")?;

    let owner = ownership_constraint(&auth);
    let report =
        report_service::update_report(&pool, auth.tenant_id, report_id, owner, request).await?;

    Ok(Json(report.into()))
}

/// Delete a report definition (hard delete).
///
/// Execution-history rows cascade with the definition; nothing else does.
/// Constrained to the owning actor unless the caller holds `reports.admin`.
pub async fn delete_report(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_permission("reports.delete")?;

    let owner = ownership_constraint(&auth);
    report_service::delete_report(&pool, auth.tenant_id, report_id, owner, auth.api_key_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Execute a saved report.
///
/// # Endpoint
///
/// `POST /api/v1/reports/{id}/run`
///
/// # Request Body
///
/// A JSON object of runtime parameters: filter overrides keyed by column
/// name, plus an optional `limit`.
///
/// ```json
/// { "customer_type": "B2C", "limit": 100 }
/// ```
///
/// # Response
///
/// `{success, report, results, row_count}` on success;
/// `{success: false, error}` when the store rejects the query. The response
/// is structured either way — execution failures are recoverable and the
/// caller may retry with corrected input.
pub async fn run_report(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
    parameters: Option<Json<HashMap<String, JsonValue>>>,
) -> Result<Json<ReportRunResponse>, AppError> {
    auth.require_permission("reports.run")?;

    let parameters = parameters.map(|Json(p)| p).unwrap_or_default();
    let outcome = report_service::run_report(
        &pool,
        auth.tenant_id,
        auth.api_key_id,
        report_id,
        &parameters,
    )
    .await?;

    Ok(Json(outcome))
}

/// Recent execution audit rows for a report (newest first, capped at 50).
pub async fn execution_history(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<Vec<ReportExecution>>, AppError> {
    auth.require_permission("reports.read")?;

    let executions = report_service::execution_history(&pool, auth.tenant_id, report_id).await?;

    Ok(Json(executions))
}

/// Ownership constraint for mutating operations.
///
/// Holders of `reports.admin` may act on any report in the tenant; everyone
/// else only on reports they created.
fn ownership_constraint(auth: &AuthContext) -> Option<Uuid> {
    if auth.has_permission("reports.admin") {
        None
    } else {
        Some(auth.api_key_id)
    }
}
