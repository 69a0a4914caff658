//! Tenant activity log writes.
//!
//! Append-only audit trail for security-relevant actions (key issuance and
//! revocation, report deletion). Rows are never mutated or deleted.

use crate::db::DbPool;
use crate::error::AppError;
use uuid::Uuid;

/// Record one activity-log entry.
pub async fn record(
    pool: &DbPool,
    tenant_id: Uuid,
    actor: Option<Uuid>,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    description: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO tenant_activity_log
            (tenant_id, actor_id, action, entity_type, entity_id, description)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(tenant_id)
    .bind(actor)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(description)
    .execute(pool)
    .await?;

    Ok(())
}
