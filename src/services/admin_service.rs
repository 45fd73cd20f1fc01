use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::feedback::{FeedbackList, FeedbackStats, FeedbackWithOrder, RatingCount},
    dto::orders::{OrderDetail, OrderList, UpdateOrderStatusRequest, UpdatePaymentMethodRequest},
    entity::{
        order_feedback::{Column as FeedbackCol, Entity as OrderFeedbacks},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{self, OrderStatus, PaymentMethod, UserSummary},
    response::{ApiResponse, Meta},
    routes::params::{FeedbackListQuery, OrderListQuery, OrderSortBy, SortOrder},
    services::notification_service,
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::Validation("invalid order status".into()))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerName).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerEmail).ilike(pattern)),
        );
    }

    let sort_col = match query.order_by.unwrap_or(OrderSortBy::CreatedAt) {
        OrderSortBy::CreatedAt => OrderCol::CreatedAt,
        OrderSortBy::Total => OrderCol::Total,
    };

    let mut finder = Orders::find().filter(condition);
    finder = match query.order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(models::Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(models::OrderItem::from)
        .collect();

    let owner = Users::find_by_id(order.user_id)
        .one(&state.orm)
        .await?
        .map(UserSummary::from);

    Ok(ApiResponse::success(
        "Order",
        OrderDetail {
            order: order.into(),
            items,
            user: owner,
        },
        Some(Meta::empty()),
    ))
}

/// Move an order to a new status. Entering CONFIRMED is the moment inventory
/// is consumed: each line item's product stock drops by the ordered quantity.
/// The guard compares against the status re-read under a row lock, so two
/// concurrent confirmations of the same order serialize and decrement once.
/// Moving an order away from CONFIRMED and back decrements again; the guard
/// is status-based on purpose, there is no per-order "already consumed" flag.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_admin(user)?;
    let target = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::Validation("invalid order status".into()))?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let current = OrderStatus::parse(&order.status).unwrap_or(OrderStatus::Pending);

    if target == OrderStatus::Confirmed && current != OrderStatus::Confirmed {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order.id))
            .all(&txn)
            .await?;

        for item in &items {
            Products::update_many()
                .col_expr(
                    ProdCol::StockQuantity,
                    Expr::col(ProdCol::StockQuantity).sub(item.quantity),
                )
                .col_expr(
                    ProdCol::UpdatedAt,
                    Expr::value(DateTimeWithTimeZone::from(Utc::now())),
                )
                .filter(ProdCol::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }
    }

    let owner_id = order.user_id;
    let order_number = order.order_number.clone();

    let mut active: OrderActive = order.into();
    active.status = Set(target.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    notification_service::notify_order_status(&txn, owner_id, &order_number, target).await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(models::OrderItem::from)
        .collect();

    let owner = Users::find_by_id(owner_id)
        .one(&txn)
        .await?
        .map(UserSummary::from);

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        OrderDetail {
            order: order.into(),
            items,
            user: owner,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_payment_method(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentMethodRequest,
) -> AppResult<ApiResponse<models::Order>> {
    ensure_admin(user)?;
    let method = PaymentMethod::parse(&payload.payment_method)
        .ok_or_else(|| AppError::Validation("invalid payment method".into()))?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: OrderActive = order.into();
    active.payment_method = Set(method.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "order_payment_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "payment_method": order.payment_method })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment method updated",
        models::Order::from(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_feedbacks(
    state: &AppState,
    user: &AuthUser,
    query: FeedbackListQuery,
) -> AppResult<ApiResponse<FeedbackList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(rating) = query.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation("rating must be between 1 and 5".into()));
        }
        condition = condition.add(FeedbackCol::Rating.eq(rating));
    }
    if let Some(has_comment) = query.has_comment {
        condition = if has_comment {
            condition
                .add(FeedbackCol::Comment.is_not_null())
                .add(FeedbackCol::Comment.ne(""))
        } else {
            condition.add(
                Condition::any()
                    .add(FeedbackCol::Comment.is_null())
                    .add(FeedbackCol::Comment.eq("")),
            )
        };
    }

    let finder = OrderFeedbacks::find()
        .filter(condition.clone())
        .order_by_desc(FeedbackCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let order_ids: Vec<Uuid> = rows.iter().map(|row| row.order_id).collect();
    let order_numbers: HashMap<Uuid, String> = Orders::find()
        .filter(OrderCol::Id.is_in(order_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|order| (order.id, order.order_number))
        .collect();

    let items = rows
        .into_iter()
        .map(|row| FeedbackWithOrder {
            order_number: order_numbers.get(&row.order_id).cloned().unwrap_or_default(),
            feedback: row.into(),
        })
        .collect();

    // Stats cover the whole filtered set, not just the current page.
    let buckets: Vec<(i16, i64)> = OrderFeedbacks::find()
        .filter(condition)
        .select_only()
        .column(FeedbackCol::Rating)
        .column_as(Expr::col(FeedbackCol::Id).count(), "count")
        .group_by(FeedbackCol::Rating)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let count: i64 = buckets.iter().map(|(_, n)| n).sum();
    let rating_sum: i64 = buckets.iter().map(|(rating, n)| i64::from(*rating) * n).sum();
    let average_rating = if count > 0 {
        rating_sum as f64 / count as f64
    } else {
        0.0
    };
    let histogram = (1..=5)
        .map(|rating| RatingCount {
            rating,
            count: buckets
                .iter()
                .find(|(r, _)| *r == rating)
                .map(|(_, n)| *n)
                .unwrap_or(0),
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Feedbacks",
        FeedbackList {
            items,
            stats: FeedbackStats {
                count,
                average_rating,
                histogram,
            },
        },
        Some(meta),
    ))
}
