use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

use crate::{
    dto::notifications::NotificationList,
    entity::notifications::{ActiveModel as NotificationActive, Column as NotifCol, Entity as Notifications},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Notification, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Insert the status-change notification for the order's owner. Runs on the
/// caller's connection so it can participate in the surrounding transaction.
pub async fn notify_order_status<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    order_number: &str,
    status: OrderStatus,
) -> AppResult<()> {
    NotificationActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        title: Set("Order update".to_string()),
        message: Set(format!("Your order {order_number} is now {status}.")),
        link: Set("/orders".to_string()),
        read: Set(false),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;

    Ok(())
}

pub async fn list_notifications(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<NotificationList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Notifications::find()
        .filter(NotifCol::UserId.eq(user.user_id))
        .order_by_desc(NotifCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let unread = Notifications::find()
        .filter(NotifCol::UserId.eq(user.user_id))
        .filter(NotifCol::Read.eq(false))
        .count(&state.orm)
        .await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Notification::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Notifications",
        NotificationList { items, unread },
        Some(meta),
    ))
}

pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let found = Notifications::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if found.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let mut active: NotificationActive = found.into();
    active.read = Set(true);
    let updated = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Notification read",
        Notification::from(updated),
        Some(Meta::empty()),
    ))
}
