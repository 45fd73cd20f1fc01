mod common;

use storefront_api::{
    dto::orders::{CheckoutItem, UpdateOrderStatusRequest},
    error::AppError,
    middleware::auth::Role,
    models::OrderStatus,
    routes::params::Pagination,
    services::{admin_service, notification_service, order_service, product_service},
};
use uuid::Uuid;

use common::{checkout_request, create_product, create_user, setup_state};

// Confirming a pending order consumes stock once; the derived in_stock flag
// follows the remaining quantity.
#[tokio::test]
async fn confirming_an_order_decrements_stock_exactly_once() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;

    let in_stock_product = create_product(&state, "P1", 1000, 5, 10).await?;
    let depleted_product = create_product(&state, "P2", 2500, 3, 10).await?;

    let checkout = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![
                CheckoutItem {
                    product_id: in_stock_product.id,
                    quantity: 3,
                },
                CheckoutItem {
                    product_id: depleted_product.id,
                    quantity: 3,
                },
            ],
        ),
    )
    .await?;
    let order = checkout.data.unwrap().order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total, 3 * 1000 + 3 * 2500);
    assert!(order.order_number.starts_with("ORD-"));

    // Pending orders do not reserve stock.
    let p1 = product_service::get_product(&state, in_stock_product.id)
        .await?
        .data
        .unwrap();
    assert_eq!(p1.stock_quantity, 5);

    let updated = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "CONFIRMED".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.order.status, OrderStatus::Confirmed);
    let owner = updated.user.expect("trimmed owner projection");
    assert_eq!(owner.email, "buyer@example.com");

    let p1 = product_service::get_product(&state, in_stock_product.id)
        .await?
        .data
        .unwrap();
    assert_eq!(p1.stock_quantity, 2);
    assert!(p1.in_stock);

    let p2 = product_service::get_product(&state, depleted_product.id)
        .await?
        .data
        .unwrap();
    assert_eq!(p2.stock_quantity, 0);
    assert!(!p2.in_stock);

    // Re-confirming an already confirmed order must not decrement again.
    admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "CONFIRMED".into(),
        },
    )
    .await?;

    let p1 = product_service::get_product(&state, in_stock_product.id)
        .await?
        .data
        .unwrap();
    assert_eq!(p1.stock_quantity, 2);

    Ok(())
}

#[tokio::test]
async fn status_transition_rejects_values_outside_the_enum() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;
    let product = create_product(&state, "P1", 1000, 5, 0).await?;

    let order = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 1,
            }],
        ),
    )
    .await?
    .data
    .unwrap()
    .order;

    let err = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "PAID".into(),
        },
    )
    .await
    .expect_err("status outside the enum");
    assert!(matches!(err, AppError::Validation(_)));

    // The order is untouched and no stock moved.
    let detail = admin_service::get_order_admin(&state, &admin, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.order.status, OrderStatus::Pending);
    let p = product_service::get_product(&state, product.id)
        .await?
        .data
        .unwrap();
    assert_eq!(p.stock_quantity, 5);

    Ok(())
}

#[tokio::test]
async fn status_transition_is_admin_only_and_checks_existence() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;
    let product = create_product(&state, "P1", 1000, 5, 0).await?;

    let order = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 1,
            }],
        ),
    )
    .await?
    .data
    .unwrap()
    .order;

    let err = admin_service::update_order_status(
        &state,
        &customer,
        order.id,
        UpdateOrderStatusRequest {
            status: "CONFIRMED".into(),
        },
    )
    .await
    .expect_err("customer is not an admin");
    assert!(matches!(err, AppError::Forbidden));

    let err = admin_service::update_order_status(
        &state,
        &admin,
        Uuid::new_v4(),
        UpdateOrderStatusRequest {
            status: "CONFIRMED".into(),
        },
    )
    .await
    .expect_err("unknown order");
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn status_change_notifies_the_order_owner() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;
    let product = create_product(&state, "P1", 1000, 5, 0).await?;

    let order = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 2,
            }],
        ),
    )
    .await?
    .data
    .unwrap()
    .order;

    admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "SHIPPED".into(),
        },
    )
    .await?;

    let list = notification_service::list_notifications(
        &state,
        &customer,
        Pagination {
            page: None,
            limit: None,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(list.unread, 1);
    let notification = &list.items[0];
    assert!(notification.message.contains(&order.order_number));
    assert!(notification.message.contains("SHIPPED"));
    assert_eq!(notification.link, "/orders");
    assert!(!notification.read);

    Ok(())
}

#[tokio::test]
async fn customers_can_cancel_only_their_own_pending_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let other = create_user(&state, "Other", "other@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;
    let product = create_product(&state, "P1", 1000, 10, 0).await?;

    let order = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 1,
            }],
        ),
    )
    .await?
    .data
    .unwrap()
    .order;

    // Ownership is matched on the authenticated email.
    let err = order_service::cancel_order(&state, &other, order.id)
        .await
        .expect_err("not the owner");
    assert!(matches!(err, AppError::Forbidden));

    let cancelled = order_service::cancel_order(&state, &customer, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

    // A cancelled order is no longer pending, so a second cancel conflicts.
    let err = order_service::cancel_order(&state, &customer, order.id)
        .await
        .expect_err("no longer pending");
    assert!(matches!(err, AppError::Conflict(_)));

    // Confirmed orders cannot be cancelled by the customer either.
    let confirmed = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 1,
            }],
        ),
    )
    .await?
    .data
    .unwrap()
    .order;
    admin_service::update_order_status(
        &state,
        &admin,
        confirmed.id,
        UpdateOrderStatusRequest {
            status: "CONFIRMED".into(),
        },
    )
    .await?;

    let err = order_service::cancel_order(&state, &customer, confirmed.id)
        .await
        .expect_err("confirmed order");
    assert!(matches!(err, AppError::Conflict(_)));
    let detail = admin_service::get_order_admin(&state, &admin, confirmed.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.order.status, OrderStatus::Confirmed);

    Ok(())
}

#[tokio::test]
async fn checkout_validates_items_and_snapshots_prices() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let product = create_product(&state, "P1", 1500, 4, 0).await?;

    let err = order_service::checkout(&state, &customer, checkout_request(&customer, vec![]))
        .await
        .expect_err("empty order");
    assert!(matches!(err, AppError::Validation(_)));

    let err = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 0,
            }],
        ),
    )
    .await
    .expect_err("zero quantity");
    assert!(matches!(err, AppError::Validation(_)));

    let err = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 5,
            }],
        ),
    )
    .await
    .expect_err("more than available");
    assert!(matches!(err, AppError::Conflict(_)));

    let resp = order_service::checkout(
        &state,
        &customer,
        checkout_request(
            &customer,
            vec![CheckoutItem {
                product_id: product.id,
                quantity: 2,
            }],
        ),
    )
    .await?
    .data
    .unwrap();

    assert_eq!(resp.items.len(), 1);
    let item = &resp.items[0];
    assert_eq!(item.product_code, "P1");
    assert_eq!(item.unit_price, 1500);
    assert_eq!(item.total, 3000);
    assert!(resp.whatsapp_url.starts_with("https://wa.me/5511999990000?text="));
    assert!(resp.whatsapp_url.contains(&resp.order.order_number));

    Ok(())
}
