//! API key authentication middleware.
//!
//! This middleware intercepts every tenant-scoped request to:
//! 1. Extract the API key from the request (header or query parameter)
//! 2. Resolve it against the key store and check activation/expiry
//! 3. Inject an authorization context into the request
//! 4. Reject unauthenticated requests with HTTP 401/403

use crate::{db::DbPool, error::AppError, models::api_key::PermissionSet, services::api_key_service};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

/// Authorization context attached to authenticated requests.
///
/// Inserted into the request's extension map by the middleware and extracted
/// by route handlers with `Extension<AuthContext>`. It exists only for the
/// duration of one request; its absence means "unauthenticated".
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Tenant the authenticated key belongs to
    ///
    /// Every tenant-scoped query downstream filters by this value, confining
    /// the request to the owning tenant's data.
    pub tenant_id: Uuid,

    /// ID of the authenticated API key, used as the acting identity for
    /// audit rows and ownership checks
    pub api_key_id: Uuid,

    /// Permission set resolved from the key's persisted JSONB form
    pub permissions: PermissionSet,
}

impl AuthContext {
    /// Check a permission against this context's set.
    ///
    /// Exact key match wins; otherwise the `"*"` wildcard decides; otherwise
    /// deny.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.grants(permission)
    }

    /// Require a permission, halting the request pipeline on failure.
    ///
    /// Handlers call this before any side effect; the `?` on the returned
    /// error makes the denial a hard stop, so no downstream code runs after
    /// a failed requirement.
    pub fn require_permission(&self, permission: &str) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermission)
        }
    }
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract the credential (`Authorization: Bearer`, `X-API-Key`, or
///    `api_key` query parameter — first match wins)
/// 2. Look up the stored key by exact match
/// 3. Reject inactive keys (403), then expired keys (403) — expiry is
///    absolute and applies even to active keys
/// 4. Record `last_used_at` fire-and-forget; a failed update never fails
///    the request
/// 5. Inject `AuthContext` into the request, call the next handler
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credential = extract_credential(&request)?;

    let key = api_key_service::find_by_key(&pool, &credential)
        .await?
        .ok_or(AppError::InvalidCredential)?;

    if !key.is_active {
        return Err(AppError::CredentialInactive);
    }

    if key.is_expired(Utc::now()) {
        return Err(AppError::CredentialExpired);
    }

    // Best-effort timestamp update; losing it does not affect correctness
    let touch_pool = pool.clone();
    let key_id = key.id;
    tokio::spawn(async move {
        if let Err(e) = api_key_service::touch_last_used(&touch_pool, key_id).await {
            tracing::warn!("failed to update last_used_at for key {}: {}", key_id, e);
        }
    });

    let auth_context = AuthContext {
        tenant_id: key.tenant_id,
        api_key_id: key.id,
        permissions: key.permissions.0,
    };

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

/// Extract the API key credential from a request.
///
/// # Transport order (first match wins)
///
/// 1. `Authorization: Bearer <token>` header
/// 2. `X-API-Key` header, used verbatim
/// 3. `api_key` query parameter — accepted but discouraged, since query
///    strings leak into access logs; its use is logged
pub fn extract_credential(request: &Request) -> Result<String, AppError> {
    if let Some(auth_header) = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    if let Some(header_key) = request
        .headers()
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
    {
        return Ok(header_key.to_string());
    }

    if let Some(query) = request.uri().query() {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if name == "api_key" {
                tracing::warn!("API key supplied via query parameter; prefer headers");
                return Ok(value.into_owned());
            }
        }
    }

    Err(AppError::MissingCredential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::collections::BTreeMap;

    fn request(uri: &str, headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn context_with(entries: &[(&str, bool)]) -> AuthContext {
        AuthContext {
            tenant_id: Uuid::new_v4(),
            api_key_id: Uuid::new_v4(),
            permissions: PermissionSet(
                entries
                    .iter()
                    .map(|(name, granted)| (name.to_string(), *granted))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }

    #[test]
    fn bearer_header_wins_over_other_transports() {
        let req = request(
            "/api/v1/reports?api_key=from_query",
            &[
                ("Authorization", "Bearer from_bearer"),
                ("X-API-Key", "from_header"),
            ],
        );
        assert_eq!(extract_credential(&req).unwrap(), "from_bearer");
    }

    #[test]
    fn x_api_key_header_wins_over_query_parameter() {
        let req = request(
            "/api/v1/reports?api_key=from_query",
            &[("X-API-Key", "from_header")],
        );
        assert_eq!(extract_credential(&req).unwrap(), "from_header");
    }

    #[test]
    fn query_parameter_is_accepted_last() {
        let req = request("/api/v1/reports?page=2&api_key=from_query", &[]);
        assert_eq!(extract_credential(&req).unwrap(), "from_query");
    }

    #[test]
    fn missing_credential_is_an_error() {
        let req = request("/api/v1/reports", &[]);
        assert!(matches!(
            extract_credential(&req),
            Err(AppError::MissingCredential)
        ));
    }

    #[test]
    fn malformed_authorization_header_is_not_a_bearer_token() {
        // No Bearer prefix and no other transport present
        let req = request("/api/v1/reports", &[("Authorization", "Basic abc123")]);
        assert!(matches!(
            extract_credential(&req),
            Err(AppError::MissingCredential)
        ));
    }

    #[test]
    fn require_permission_halts_on_denial() {
        let ctx = context_with(&[("products.read", true)]);
        assert!(ctx.require_permission("products.read").is_ok());
        assert!(matches!(
            ctx.require_permission("products.write"),
            Err(AppError::InsufficientPermission)
        ));
    }

    #[test]
    fn wildcard_grant_covers_unlisted_permissions() {
        let ctx = context_with(&[("*", true), ("reports.delete", false)]);
        assert!(ctx.has_permission("reports.run"));
        assert!(!ctx.has_permission("reports.delete"));
    }
}
