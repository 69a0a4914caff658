//! API key model and tenant permission set.
//!
//! API keys are the credential for programmatic access to a tenant's data.
//! The key value itself is the lookup handle and is stored in clear; the
//! associated bearer secret is stored only as a salted one-way hash and is
//! never retrievable after issuance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Reserved permission key that acts as a fallback grant/deny for any
/// permission not explicitly listed.
pub const WILDCARD_PERMISSION: &str = "*";

/// Typed permission set: permission name → granted flag.
///
/// Persisted as a JSONB object. Because the mapping is typed, a malformed
/// permission document (non-boolean values, non-object shape) is rejected at
/// write time and can never be stored.
///
/// # Wildcard Semantics
///
/// - An exact key match wins and returns its boolean.
/// - Otherwise the `"*"` wildcard entry, if present, decides.
/// - Otherwise the answer is deny (an empty set grants nothing).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(pub BTreeMap<String, bool>);

impl PermissionSet {
    /// Check whether this set grants the named permission.
    pub fn grants(&self, permission: &str) -> bool {
        if let Some(&explicit) = self.0.get(permission) {
            return explicit;
        }
        self.0
            .get(WILDCARD_PERMISSION)
            .copied()
            .unwrap_or(false)
    }
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `tenant_api_keys` table. Each key:
/// - Belongs to exactly one tenant (via `tenant_id`)
/// - Must never authorize access to another tenant's data
///
/// Keys are never hard-deleted; revocation (`is_active = false`) is the
/// terminal state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// Tenant that owns this key
    ///
    /// Every tenant-scoped query downstream of authentication filters by
    /// this value.
    pub tenant_id: Uuid,

    /// Human-readable display name
    pub key_name: String,

    /// The key value: `nautilus_` followed by 64 hex characters
    ///
    /// Stored in clear because it is the lookup handle, not the secret.
    /// Unique across all tenants.
    pub api_key: String,

    /// Salted one-way hash of the bearer secret
    ///
    /// The plaintext secret is returned exactly once at issuance and is not
    /// recoverable from this value.
    pub secret_hash: String,

    /// Permission set decoded from its persisted JSONB form
    pub permissions: Json<PermissionSet>,

    /// Whether this key is currently active
    ///
    /// Inactive keys are rejected during authentication. Revocation flips
    /// this flag instead of deleting the record.
    pub is_active: bool,

    /// Optional expiry; once in the past the key is permanently disabled
    /// regardless of the active flag
    pub expires_at: Option<DateTime<Utc>>,

    /// Updated on every successful authentication (best effort)
    pub last_used_at: Option<DateTime<Utc>>,

    /// Actor that issued the key
    pub created_by: Option<Uuid>,

    /// Timestamp when this API key was created
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Whether the key's expiry timestamp is in the past.
    ///
    /// Compared against the supplied request time so authentication is a
    /// pure function of (request, key snapshot).
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Masked preview of the key value: first 8 and last 4 characters.
    ///
    /// List views only ever show this form so the full credential is never
    /// redisplayed.
    pub fn masked_key(&self) -> String {
        mask_key(&self.api_key)
    }
}

/// Mask a key value as `first8...last4`.
///
/// Values too short to mask meaningfully are fully redacted. Counts
/// characters rather than bytes so arbitrary stored values cannot split a
/// multibyte character.
pub fn mask_key(key: &str) -> String {
    let length = key.chars().count();
    if length <= 12 {
        return "****".to_string();
    }
    let head: String = key.chars().take(8).collect();
    let tail: String = key.chars().skip(length - 4).collect();
    format!("{}...{}", head, tail)
}

/// Request body for issuing a new API key.
///
/// # JSON Example
///
/// ```json
/// {
///   "key_name": "Storefront integration",
///   "permissions": { "products.read": true, "reports.run": true },
///   "expires_at": "2027-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub key_name: String,

    #[serde(default)]
    pub permissions: PermissionSet,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Response returned exactly once at issuance.
///
/// The `api_secret` is not retrievable again through any API; callers are
/// warned this is their only chance to record it.
#[derive(Debug, Serialize)]
pub struct ApiKeyCreatedResponse {
    pub success: bool,
    pub api_key: String,
    pub api_secret: String,
    pub message: String,
}

/// One entry of the key listing response.
///
/// The key value is masked and the secret is absent entirely.
#[derive(Debug, Serialize)]
pub struct ApiKeySummary {
    pub id: Uuid,
    pub key_name: String,
    pub api_key: String,
    pub permissions: PermissionSet,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeySummary {
    fn from(key: ApiKey) -> Self {
        let masked = key.masked_key();
        Self {
            id: key.id,
            key_name: key.key_name,
            api_key: masked,
            permissions: key.permissions.0,
            is_active: key.is_active,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
            created_at: key.created_at,
        }
    }
}
