use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::feedback::FeedbackRequest,
    dto::orders::{CheckoutRequest, CheckoutResponse, OrderList, OrderWithItems},
    entity::{
        order_feedback::{ActiveModel as FeedbackActive, Column as FeedbackCol, Entity as OrderFeedbacks},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{self, OrderStatus, PaymentMethod},
    response::{ApiResponse, Meta},
    routes::params::{CustomerOrderQuery, SortOrder},
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: CustomerOrderQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::Validation("invalid order status".into()))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
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

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_items(state, order.id).await?;

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order.into(),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Create a PENDING order from the submitted line items and hand the caller
/// a WhatsApp link with the order summary. Stock is untouched here: pending
/// orders do not reserve inventory, the decrement happens on confirmation.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let payment_method = PaymentMethod::parse(&payload.payment_method)
        .ok_or_else(|| AppError::Validation("invalid payment method".into()))?;

    if payload.items.is_empty() {
        return Err(AppError::Validation("order has no items".into()));
    }
    if payload.items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::Validation("quantity must be positive".into()));
    }

    let txn = state.orm.begin().await?;

    let mut lines: Vec<(ProductModel, i32)> = Vec::with_capacity(payload.items.len());
    let mut total: i64 = 0;
    for item in &payload.items {
        let product = Products::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::Validation(format!("unknown product {}", item.product_id)))?;

        if product.stock_quantity < item.quantity {
            return Err(AppError::Conflict(format!(
                "insufficient stock for product {}",
                product.code
            )));
        }

        total += product.price * i64::from(item.quantity);
        lines.push((product, item.quantity));
    }

    let existing = Orders::find().count(&txn).await?;
    let order_number = next_order_number(existing);
    let now = Utc::now();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_method: Set(payment_method.as_str().to_string()),
        total: Set(total),
        customer_name: Set(payload.customer.name),
        customer_email: Set(payload.customer.email),
        customer_phone: Set(payload.customer.phone),
        customer_document: Set(payload.customer.document),
        delivery_street: Set(payload.delivery.street),
        delivery_number: Set(payload.delivery.number),
        delivery_complement: Set(payload.delivery.complement),
        delivery_district: Set(payload.delivery.district),
        delivery_city: Set(payload.delivery.city),
        delivery_state: Set(payload.delivery.state),
        delivery_zip: Set(payload.delivery.zip),
        notes: Set(payload.notes),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut item_models: Vec<OrderItemModel> = Vec::with_capacity(lines.len());
    for (product, quantity) in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_code: Set(product.code.clone()),
            product_name: Set(product.name.clone()),
            quantity: Set(*quantity),
            unit_price: Set(product.price),
            total: Set(product.price * i64::from(*quantity)),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        item_models.push(item);
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_number": order.order_number })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let whatsapp_url = whatsapp_handoff_url(
        &state.config.whatsapp_number,
        &order.order_number,
        &item_models,
        total,
    );

    Ok(ApiResponse::success(
        "Checkout created",
        CheckoutResponse {
            order: order.into(),
            items: item_models.into_iter().map(models::OrderItem::from).collect(),
            whatsapp_url,
        },
        Some(Meta::empty()),
    ))
}

/// Customers may withdraw an order only while it is still PENDING; ownership
/// is established by the authenticated email matching the order's customer
/// snapshot. Nothing was decremented for a pending order, so no stock moves.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !order.customer_email.eq_ignore_ascii_case(&user.email) {
        return Err(AppError::Forbidden);
    }

    let current = OrderStatus::parse(&order.status).unwrap_or(OrderStatus::Pending);
    if current != OrderStatus::Pending {
        return Err(AppError::Conflict(
            "only pending orders can be cancelled".into(),
        ));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(models::OrderItem::from)
        .collect();

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Order cancelled",
        OrderWithItems {
            order: order.into(),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Upsert keyed by order id: resubmission replaces the stored rating and
/// comment, a second row is never created.
pub async fn submit_feedback(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: FeedbackRequest,
) -> AppResult<ApiResponse<models::OrderFeedback>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".into()));
    }
    if let Some(comment) = payload.comment.as_ref() {
        if comment.chars().count() > 500 {
            return Err(AppError::Validation(
                "comment must be at most 500 characters".into(),
            ));
        }
    }

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let current = OrderStatus::parse(&order.status).unwrap_or(OrderStatus::Pending);
    if current != OrderStatus::Delivered {
        return Err(AppError::Conflict(
            "feedback is only accepted for delivered orders".into(),
        ));
    }

    let now = Utc::now();
    let existing = OrderFeedbacks::find()
        .filter(FeedbackCol::OrderId.eq(order.id))
        .one(&txn)
        .await?;

    let stored = match existing {
        Some(row) => {
            let mut active: FeedbackActive = row.into();
            active.rating = Set(payload.rating);
            active.comment = Set(payload.comment);
            active.updated_at = Set(now.into());
            active.update(&txn).await?
        }
        None => {
            FeedbackActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                user_id: Set(user.user_id),
                rating: Set(payload.rating),
                comment: Set(payload.comment),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Feedback saved",
        models::OrderFeedback::from(stored),
        Some(Meta::empty()),
    ))
}

pub async fn get_feedback(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<models::OrderFeedback>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let feedback = OrderFeedbacks::find()
        .filter(FeedbackCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success(
        "Feedback",
        models::OrderFeedback::from(feedback),
        Some(Meta::empty()),
    ))
}

async fn load_items(state: &AppState, order_id: Uuid) -> AppResult<Vec<models::OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(models::OrderItem::from)
        .collect())
}

/// Human-readable sequential number; the sequence starts at ORD-1001.
fn next_order_number(existing: u64) -> String {
    format!("ORD-{}", 1001 + existing)
}

fn whatsapp_handoff_url(
    store_number: &str,
    order_number: &str,
    items: &[OrderItemModel],
    total: i64,
) -> String {
    let mut message = format!("New order {order_number}\n");
    for item in items {
        message.push_str(&format!(
            "{} x{} - {}\n",
            item.product_name,
            item.quantity,
            format_price(item.total)
        ));
    }
    message.push_str(&format!("Total: {}", format_price(total)));

    format!("https://wa.me/{store_number}?text={}", percent_encode(&message))
}

fn format_price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

/// RFC 3986 unreserved characters pass through, everything else is escaped.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_start_at_1001() {
        assert_eq!(next_order_number(0), "ORD-1001");
        assert_eq!(next_order_number(41), "ORD-1042");
    }

    #[test]
    fn prices_render_with_two_decimals() {
        assert_eq!(format_price(123456), "1234.56");
        assert_eq!(format_price(500), "5.00");
        assert_eq!(format_price(7), "0.07");
    }

    #[test]
    fn handoff_message_is_url_safe() {
        assert_eq!(percent_encode("a b\nc&d"), "a%20b%0Ac%26d");
        assert_eq!(percent_encode("ORD-1001"), "ORD-1001");
    }
}
