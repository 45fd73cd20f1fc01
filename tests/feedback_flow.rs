mod common;

use storefront_api::{
    dto::feedback::FeedbackRequest,
    dto::orders::{CheckoutItem, UpdateOrderStatusRequest},
    error::AppError,
    middleware::auth::{AuthUser, Role},
    models::Order,
    routes::params::{FeedbackListQuery, Pagination},
    services::{admin_service, order_service},
    state::AppState,
};

use common::{checkout_request, create_product, create_user, setup_state};

async fn delivered_order(
    state: &AppState,
    customer: &AuthUser,
    admin: &AuthUser,
    code: &str,
) -> anyhow::Result<Order> {
    let product = create_product(state, code, 1000, 50, 0).await?;
    let order = order_service::checkout(
        state,
        customer,
        checkout_request(
            customer,
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
        state,
        admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "DELIVERED".into(),
        },
    )
    .await?;

    Ok(order)
}

#[tokio::test]
async fn feedback_requires_a_delivered_order() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
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

    let err = order_service::submit_feedback(
        &state,
        &customer,
        order.id,
        FeedbackRequest {
            rating: 4,
            comment: None,
        },
    )
    .await
    .expect_err("order not delivered");
    assert!(matches!(err, AppError::Conflict(_)));

    // No row was created.
    let err = order_service::get_feedback(&state, &customer, order.id)
        .await
        .expect_err("nothing stored");
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn feedback_is_validated_and_owner_only() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let other = create_user(&state, "Other", "other@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;

    let order = delivered_order(&state, &customer, &admin, "P1").await?;

    for rating in [0, 6, -1] {
        let err = order_service::submit_feedback(
            &state,
            &customer,
            order.id,
            FeedbackRequest {
                rating,
                comment: None,
            },
        )
        .await
        .expect_err("rating outside 1-5");
        assert!(matches!(err, AppError::Validation(_)));
    }

    let err = order_service::submit_feedback(
        &state,
        &customer,
        order.id,
        FeedbackRequest {
            rating: 5,
            comment: Some("x".repeat(501)),
        },
    )
    .await
    .expect_err("comment too long");
    assert!(matches!(err, AppError::Validation(_)));

    let err = order_service::submit_feedback(
        &state,
        &other,
        order.id,
        FeedbackRequest {
            rating: 5,
            comment: None,
        },
    )
    .await
    .expect_err("not the owner");
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn resubmitting_feedback_overwrites_instead_of_duplicating() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;

    let order = delivered_order(&state, &customer, &admin, "P1").await?;

    let first = order_service::submit_feedback(
        &state,
        &customer,
        order.id,
        FeedbackRequest {
            rating: 4,
            comment: Some("good".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(first.rating, 4);

    let second = order_service::submit_feedback(
        &state,
        &customer,
        order.id,
        FeedbackRequest {
            rating: 2,
            comment: Some("changed my mind".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.rating, 2);

    let stored = order_service::get_feedback(&state, &customer, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(stored.rating, 2);
    assert_eq!(stored.comment.as_deref(), Some("changed my mind"));

    // Exactly one row exists for the order.
    let list = admin_service::list_feedbacks(
        &state,
        &admin,
        FeedbackListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            rating: None,
            has_comment: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(list.stats.count, 1);
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].order_number, order.order_number);

    Ok(())
}

#[tokio::test]
async fn admin_feedback_listing_filters_and_aggregates() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let customer = create_user(&state, "Buyer", "buyer@example.com", Role::Customer).await?;
    let admin = create_user(&state, "Ops", "ops@example.com", Role::Admin).await?;

    let first = delivered_order(&state, &customer, &admin, "P1").await?;
    let second = delivered_order(&state, &customer, &admin, "P2").await?;

    order_service::submit_feedback(
        &state,
        &customer,
        first.id,
        FeedbackRequest {
            rating: 5,
            comment: Some("fast delivery".into()),
        },
    )
    .await?;
    order_service::submit_feedback(
        &state,
        &customer,
        second.id,
        FeedbackRequest {
            rating: 2,
            comment: None,
        },
    )
    .await?;

    let all = admin_service::list_feedbacks(
        &state,
        &admin,
        FeedbackListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            rating: None,
            has_comment: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(all.stats.count, 2);
    assert!((all.stats.average_rating - 3.5).abs() < f64::EPSILON);
    let five_star = all
        .stats
        .histogram
        .iter()
        .find(|bucket| bucket.rating == 5)
        .unwrap();
    assert_eq!(five_star.count, 1);

    let with_comment = admin_service::list_feedbacks(
        &state,
        &admin,
        FeedbackListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            rating: None,
            has_comment: Some(true),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(with_comment.items.len(), 1);
    assert_eq!(with_comment.items[0].feedback.rating, 5);

    let two_star = admin_service::list_feedbacks(
        &state,
        &admin,
        FeedbackListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            rating: Some(2),
            has_comment: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(two_star.stats.count, 1);

    // The listing is admin only.
    let err = admin_service::list_feedbacks(
        &state,
        &customer,
        FeedbackListQuery {
            pagination: Pagination {
                page: None,
                limit: None,
            },
            rating: None,
            has_comment: None,
        },
    )
    .await
    .expect_err("customer is not an admin");
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}
