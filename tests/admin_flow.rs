mod common;

use storefront_api::{
    dto::orders::{CheckoutItem, UpdateOrderStatusRequest, UpdatePaymentMethodRequest},
    dto::products::{BulkProductUpdate, BulkUpdateRequest},
    error::AppError,
    middleware::auth::Role,
    models::PaymentMethod,
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, notification_service, order_service, product_service},
};
use uuid::Uuid;

use common::{checkout_request, create_product, create_user, setup_state};

#[tokio::test]
async fn payment_method_is_restricted_to_the_enum() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
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

    let updated = admin_service::update_payment_method(
        &state,
        &admin,
        order.id,
        UpdatePaymentMethodRequest {
            payment_method: "CREDIT_CARD".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.payment_method, PaymentMethod::CreditCard);

    let err = admin_service::update_payment_method(
        &state,
        &admin,
        order.id,
        UpdatePaymentMethodRequest {
            payment_method: "BARTER".into(),
        },
    )
    .await
    .expect_err("outside the enum");
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn order_listing_filters_by_status_and_is_admin_only() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;
    let product = create_product(&state, "P1", 1000, 50, 0).await?;

    let mut ids = Vec::new();
    for _ in 0..3 {
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
        ids.push(order.id);
    }

    admin_service::update_order_status(
        &state,
        &admin,
        ids[0],
        UpdateOrderStatusRequest {
            status: "CONFIRMED".into(),
        },
    )
    .await?;

    let confirmed = admin_service::list_all_orders(
        &state,
        &admin,
        OrderListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            status: Some("CONFIRMED".into()),
            search: None,
            order_by: None,
            order: None,
        },
    )
    .await?;
    assert_eq!(confirmed.meta.unwrap().total, Some(1));

    let err = admin_service::list_all_orders(
        &state,
        &customer,
        OrderListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            status: None,
            search: None,
            order_by: None,
            order: None,
        },
    )
    .await
    .expect_err("customer is not an admin");
    assert!(matches!(err, AppError::Forbidden));

    let err = admin_service::list_all_orders(
        &state,
        &admin,
        OrderListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            status: Some("PAID".into()),
            search: None,
            order_by: None,
            order: None,
        },
    )
    .await
    .expect_err("status outside the enum");
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn low_stock_listing_uses_the_per_product_threshold() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;

    let low = create_product(&state, "LOW", 1000, 2, 5).await?;
    let _plenty = create_product(&state, "FULL", 1000, 50, 5).await?;

    let list = product_service::list_low_stock(
        &state,
        &admin,
        Pagination {
            page: None,
            limit: None,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].id, low.id);

    Ok(())
}

#[tokio::test]
async fn bulk_update_applies_all_or_nothing() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;

    let first = create_product(&state, "P1", 1000, 10, 0).await?;
    let second = create_product(&state, "P2", 2000, 20, 0).await?;

    let updated = product_service::bulk_update(
        &state,
        &admin,
        BulkUpdateRequest {
            updates: vec![
                BulkProductUpdate {
                    id: first.id,
                    price: Some(1100),
                    stock_quantity: None,
                },
                BulkProductUpdate {
                    id: second.id,
                    price: None,
                    stock_quantity: Some(25),
                },
            ],
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.items.len(), 2);

    let err = product_service::bulk_update(
        &state,
        &admin,
        BulkUpdateRequest {
            updates: vec![
                BulkProductUpdate {
                    id: first.id,
                    price: Some(9900),
                    stock_quantity: None,
                },
                BulkProductUpdate {
                    id: Uuid::new_v4(),
                    price: Some(1),
                    stock_quantity: None,
                },
            ],
        },
    )
    .await
    .expect_err("unknown id in batch");
    assert!(matches!(err, AppError::NotFound));

    // The failing batch rolled back entirely.
    let p1 = product_service::get_product(&state, first.id)
        .await?
        .data
        .unwrap();
    assert_eq!(p1.price, 1100);

    Ok(())
}

#[tokio::test]
async fn notifications_are_marked_read_by_their_owner_only() -> anyhow::Result<()> {
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

    admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "CONFIRMED".into(),
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
    let notification_id = list.items[0].id;

    let err = notification_service::mark_read(&state, &other, notification_id)
        .await
        .expect_err("not the owner");
    assert!(matches!(err, AppError::Forbidden));

    let marked = notification_service::mark_read(&state, &customer, notification_id)
        .await?
        .data
        .unwrap();
    assert!(marked.read);

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
    assert_eq!(list.unread, 0);

    Ok(())
}
