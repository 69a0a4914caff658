//! API key management HTTP handlers.
//!
//! This module implements the key-management endpoints:
//! - POST /api/v1/keys - Issue a new key for the authenticated tenant
//! - GET /api/v1/keys - List the tenant's keys (masked)
//! - DELETE /api/v1/keys/{id} - Revoke a key
//!
//! All three require the `api_keys.manage` permission and operate strictly
//! within the authenticated tenant.

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::api_key::{ApiKeyCreatedResponse, ApiKeySummary, CreateApiKeyRequest},
    services::api_key_service,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

/// Issue a new API key.
///
/// # Endpoint
///
/// `POST /api/v1/keys`
///
/// # Request Body
///
/// ```json
/// {
///   "key_name": "Storefront integration",
///   "permissions": { "products.read": true, "reports.run": true },
///   "expires_at": "2027-01-01T00:00:00Z"
/// }
/// ```
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "success": true,
///   "api_key": "nautilus_3f2a...",
///   "api_secret": "9c41...",
///   "message": "API key created successfully. Save the secret - it will not be shown again!"
/// }
/// ```
///
/// The secret appears in this response and nowhere else, ever.
pub async fn create_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.require_permission("api_keys.manage")?;

    let created: ApiKeyCreatedResponse =
        api_key_service::create_api_key(&pool, auth.tenant_id, auth.api_key_id, request).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// List the tenant's API keys.
///
/// Key values are masked (`first8...last4`) and secrets are absent; the full
/// credential is never redisplayed after issuance.
pub async fn list_api_keys(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKeySummary>>, AppError> {
    auth.require_permission("api_keys.manage")?;

    let keys = api_key_service::list_api_keys(&pool, auth.tenant_id).await?;

    Ok(Json(keys))
}

/// Revoke an API key.
///
/// # Security
///
/// Ownership is verified against the authenticated tenant before mutation; a
/// key belonging to another tenant returns 404, indistinguishable from true
/// absence. Revocation is idempotent and one-way.
pub async fn revoke_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth.require_permission("api_keys.manage")?;

    api_key_service::revoke_api_key(&pool, auth.tenant_id, key_id, auth.api_key_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "API key revoked successfully"
    })))
}
