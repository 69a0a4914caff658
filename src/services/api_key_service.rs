//! API key service - issuance, lookup and revocation.
//!
//! Key values are namespaced random tokens (`nautilus_` + 64 hex characters)
//! and act as the lookup handle, so they are stored in clear. The bearer
//! secret has the same entropy but is persisted only as a salted one-way
//! hash; the plaintext leaves the service exactly once, at issuance.

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::api_key::{
    ApiKey, ApiKeyCreatedResponse, ApiKeySummary, CreateApiKeyRequest,
};
use crate::services::audit_service;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::types::Json;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Prefix identifying keys issued by this platform.
pub const KEY_PREFIX: &str = "nautilus_";

/// Revocation existence check, scoped to the tenant only.
///
/// Deliberately not filtered on `is_active`: a key stays addressable after
/// revocation so revoking twice succeeds.
const REVOKE_LOOKUP_SQL: &str =
    "SELECT key_name FROM tenant_api_keys WHERE id = $1 AND tenant_id = $2";

/// Revocation update; unconditional on the current flag for the same reason.
const REVOKE_UPDATE_SQL: &str = "UPDATE tenant_api_keys SET is_active = FALSE WHERE id = $1";

/// Look up a key by its exact stored value.
///
/// Returns the row regardless of active/expiry state; the authenticator
/// distinguishes those cases itself so the failure taxonomy stays precise.
pub async fn find_by_key(pool: &DbPool, api_key: &str) -> Result<Option<ApiKey>, AppError> {
    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, tenant_id, key_name, api_key, secret_hash, permissions,
               is_active, expires_at, last_used_at, created_by, created_at
        FROM tenant_api_keys
        WHERE api_key = $1
        "#,
    )
    .bind(api_key)
    .fetch_optional(pool)
    .await?;

    Ok(key)
}

/// Record a successful authentication.
///
/// Called fire-and-forget from the middleware; loss of this update does not
/// affect correctness.
pub async fn touch_last_used(pool: &DbPool, key_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE tenant_api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(key_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Issue a new API key for a tenant.
///
/// # Process
///
/// 1. Generate the key value and a separate secret (32 random bytes each)
/// 2. Persist the key in clear and the secret as a salted hash
/// 3. Record an activity-log entry for the issuance
/// 4. Return key and secret — the only time the secret is ever surfaced
pub async fn create_api_key(
    pool: &DbPool,
    tenant_id: Uuid,
    actor: Uuid,
    request: CreateApiKeyRequest,
) -> Result<ApiKeyCreatedResponse, AppError> {
    if request.key_name.trim().is_empty() {
        return Err(AppError::InvalidRequest("Key name is required".to_string()));
    }

    let api_key = generate_api_key();
    let api_secret = generate_secret();
    let secret_hash = hash_secret(&api_secret);

    let key_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO tenant_api_keys
            (tenant_id, key_name, api_key, secret_hash, permissions, created_by, is_active, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(request.key_name.trim())
    .bind(&api_key)
    .bind(&secret_hash)
    .bind(Json(&request.permissions))
    .bind(actor)
    .bind(request.expires_at)
    .fetch_one(pool)
    .await?;

    audit_service::record(
        pool,
        tenant_id,
        Some(actor),
        "api_key_created",
        "api_key",
        Some(key_id),
        &format!("API key created: {}", request.key_name.trim()),
    )
    .await?;

    Ok(ApiKeyCreatedResponse {
        success: true,
        api_key,
        api_secret,
        message: "API key created successfully. Save the secret - it will not be shown again!"
            .to_string(),
    })
}

/// List a tenant's keys with masked key values.
pub async fn list_api_keys(pool: &DbPool, tenant_id: Uuid) -> Result<Vec<ApiKeySummary>, AppError> {
    let keys = sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, tenant_id, key_name, api_key, secret_hash, permissions,
               is_active, expires_at, last_used_at, created_by, created_at
        FROM tenant_api_keys
        WHERE tenant_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(keys.into_iter().map(Into::into).collect())
}

/// Revoke a key (set `is_active = false`).
///
/// Ownership is verified before mutation: a key belonging to another tenant
/// surfaces as `NotFound`, never `Forbidden`, so cross-tenant existence is
/// not confirmable. Revoking an already-revoked key succeeds (idempotent);
/// there is no un-revoke.
pub async fn revoke_api_key(
    pool: &DbPool,
    tenant_id: Uuid,
    key_id: Uuid,
    actor: Uuid,
) -> Result<(), AppError> {
    let key_name: String = sqlx::query_scalar(REVOKE_LOOKUP_SQL)
        .bind(key_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?;

    sqlx::query(REVOKE_UPDATE_SQL)
        .bind(key_id)
        .execute(pool)
        .await?;

    audit_service::record(
        pool,
        tenant_id,
        Some(actor),
        "api_key_revoked",
        "api_key",
        Some(key_id),
        &format!("API key revoked: {}", key_name),
    )
    .await?;

    Ok(())
}

/// Generate a key value: fixed prefix + 64 hex characters.
///
/// 32 bytes of cryptographically secure randomness, hex-encoded.
pub fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{}{}", KEY_PREFIX, hex::encode(bytes))
}

/// Generate a bearer secret: 64 hex characters, no prefix.
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Hash a secret with a random salt.
///
/// HMAC-SHA256 keyed by a fresh 16-byte salt, stored as
/// `hex(salt)$hex(mac)`. One-way: the plaintext is not recoverable.
pub fn hash_secret(secret: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let mut mac = HmacSha256::new_from_slice(&salt).expect("HMAC accepts any key length");
    mac.update(secret.as_bytes());
    let digest = mac.finalize();
    format!("{}${}", hex::encode(salt), hex::encode(digest.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_is_namespaced_and_high_entropy() {
        let key = generate_api_key();
        assert!(key.starts_with(KEY_PREFIX));
        let token = &key[KEY_PREFIX.len()..];
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_secret_has_same_entropy_without_prefix() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(generate_api_key(), generate_api_key());
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn secret_hash_is_salted() {
        let hash_a = hash_secret("same-secret");
        let hash_b = hash_secret("same-secret");
        // Fresh salt per call, so equal inputs hash differently
        assert_ne!(hash_a, hash_b);

        let (salt, mac) = hash_a.split_once('$').unwrap();
        assert_eq!(salt.len(), 32);
        assert_eq!(mac.len(), 64);
        assert!(!hash_a.contains("same-secret"));
    }

    #[test]
    fn revocation_statements_ignore_the_current_active_flag() {
        // Revoking an already-revoked key must succeed, so neither the
        // existence check nor the update may filter on is_active
        let (_, lookup_filter) = REVOKE_LOOKUP_SQL.split_once("WHERE").unwrap();
        assert!(!lookup_filter.contains("is_active"));
        assert!(lookup_filter.contains("tenant_id = $2"));

        let (_, update_filter) = REVOKE_UPDATE_SQL.split_once("WHERE").unwrap();
        assert!(!update_filter.contains("is_active"));
        assert!(REVOKE_UPDATE_SQL.contains("SET is_active = FALSE"));
    }
}
