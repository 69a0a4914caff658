//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Missing, invalid, inactive or expired API keys
/// - **Authorization Errors**: Permission checks that fail
/// - **Report Construction Errors**: Tables rejected before any SQL exists
/// - **Resource Errors**: Requested resources not found (including resources
///   owned by a different tenant, which must be indistinguishable from absence)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No credential was supplied on any of the accepted transports.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("API key required")]
    MissingCredential,

    /// Supplied credential does not match any stored key.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidCredential,

    /// Key exists but has been revoked.
    ///
    /// Returns HTTP 403 Forbidden. Distinct from "not found" for operator
    /// diagnosis; the body stays generic.
    #[error("API key is inactive")]
    CredentialInactive,

    /// Key exists but its expiry timestamp is in the past.
    ///
    /// Returns HTTP 403 Forbidden. Expiry is absolute and independent of the
    /// active flag.
    #[error("API key has expired")]
    CredentialExpired,

    /// Authenticated key does not hold the required permission.
    ///
    /// Returns HTTP 403 Forbidden with a generic body. Handlers check this
    /// before any side effect, so a denial leaves no partial writes.
    #[error("Insufficient permissions")]
    InsufficientPermission,

    /// Report targets a table outside the reporting allow-list.
    ///
    /// Returns HTTP 400 Bad Request. This is the primary injection boundary:
    /// the failure happens before any SQL is constructed.
    #[error("Invalid table")]
    InvalidTable,

    /// Requested resource does not exist or belongs to a different tenant.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Not found")]
    NotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted into `{"error": "<message>"}`
/// bodies.
///
/// # Status Code Mapping
///
/// - `MissingCredential` / `InvalidCredential` → 401 Unauthorized
/// - `CredentialInactive` / `CredentialExpired` → 403 Forbidden
/// - `InsufficientPermission` → 403 Forbidden
/// - `InvalidTable` / `InvalidRequest` → 400 Bad Request
/// - `NotFound` → 404 Not Found
/// - `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::MissingCredential | AppError::InvalidCredential => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::CredentialInactive
            | AppError::CredentialExpired
            | AppError::InsufficientPermission => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::InvalidTable => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(ref e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": message }));

        (status, body).into_response()
    }
}
