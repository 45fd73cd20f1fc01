use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth,
        feedback::{FeedbackList, FeedbackRequest, FeedbackStats, FeedbackWithOrder, RatingCount},
        notifications::NotificationList,
        orders::{
            CheckoutItem, CheckoutRequest, CheckoutResponse, OrderDetail, OrderList,
            OrderWithItems, UpdateOrderStatusRequest, UpdatePaymentMethodRequest,
        },
        products::{BulkProductUpdate, BulkUpdateRequest, CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{
        CustomerInfo, DeliveryAddress, Notification, Order, OrderFeedback, OrderItem, OrderStatus,
        PaymentMethod, Product, UserSummary,
    },
    response::{ApiResponse, Meta},
    routes::{admin, auth as auth_routes, health, notifications, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth_routes::register,
        auth_routes::login,
        auth_routes::forgot_password,
        auth_routes::reset_password,
        products::list_products,
        products::get_product,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        orders::get_feedback,
        orders::submit_feedback,
        notifications::list_notifications,
        notifications::mark_read,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::update_payment_method,
        admin::list_feedbacks,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::bulk_update_products,
        admin::list_low_stock
    ),
    components(
        schemas(
            UserSummary,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            PaymentMethod,
            CustomerInfo,
            DeliveryAddress,
            Notification,
            OrderFeedback,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::ForgotPasswordRequest,
            auth::ResetPasswordRequest,
            CheckoutItem,
            CheckoutRequest,
            CheckoutResponse,
            OrderWithItems,
            OrderDetail,
            OrderList,
            UpdateOrderStatusRequest,
            UpdatePaymentMethodRequest,
            FeedbackRequest,
            FeedbackWithOrder,
            FeedbackStats,
            RatingCount,
            FeedbackList,
            NotificationList,
            CreateProductRequest,
            UpdateProductRequest,
            BulkProductUpdate,
            BulkUpdateRequest,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::CustomerOrderQuery,
            params::FeedbackListQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderDetail>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderFeedback>,
            ApiResponse<FeedbackList>,
            ApiResponse<NotificationList>,
            ApiResponse<UserSummary>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Public catalog endpoints"),
        (name = "Orders", description = "Customer order endpoints"),
        (name = "Notifications", description = "Notification endpoints"),
        (name = "Admin", description = "Administrative endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
