use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use serde_json::Value;
use uuid::Uuid;

use crate::{entity::audit_logs, error::AppResult};

/// Append-only trail of admin/account mutations. Callers treat failures as
/// non-fatal and log them instead of surfacing.
pub async fn log_audit(
    conn: &DatabaseConnection,
    actor_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    detail: Option<Value>,
) -> AppResult<()> {
    audit_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        actor_id: Set(actor_id),
        action: Set(action.to_string()),
        resource: Set(resource.map(str::to_string)),
        detail: Set(detail),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;

    Ok(())
}
