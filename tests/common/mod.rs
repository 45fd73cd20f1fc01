use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, Schema};
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    dto::orders::{CheckoutItem, CheckoutRequest},
    entity,
    middleware::auth::{AuthUser, Role},
    models::{CustomerInfo, DeliveryAddress},
    ratelimit::RateLimiter,
    state::AppState,
};

/// Fresh in-memory SQLite database with the schema derived from the entities.
pub async fn setup_state() -> anyhow::Result<AppState> {
    let orm = Database::connect("sqlite::memory:").await?;
    let backend = orm.get_database_backend();
    let schema = Schema::new(backend);

    orm.execute(backend.build(&schema.create_table_from_entity(entity::Users)))
        .await?;
    orm.execute(backend.build(&schema.create_table_from_entity(entity::Products)))
        .await?;
    orm.execute(backend.build(&schema.create_table_from_entity(entity::Orders)))
        .await?;
    orm.execute(backend.build(&schema.create_table_from_entity(entity::OrderItems)))
        .await?;
    orm.execute(backend.build(&schema.create_table_from_entity(entity::OrderFeedback)))
        .await?;
    orm.execute(backend.build(&schema.create_table_from_entity(entity::Notifications)))
        .await?;
    orm.execute(backend.build(&schema.create_table_from_entity(entity::AuditLogs)))
        .await?;

    Ok(AppState {
        orm,
        limiter: RateLimiter::in_memory(),
        config: Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            redis_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            whatsapp_number: "5511999990000".into(),
        }),
    })
}

pub async fn create_user(
    state: &AppState,
    name: &str,
    email: &str,
    role: Role,
) -> anyhow::Result<AuthUser> {
    let user = entity::users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        phone: Set(None),
        password_hash: Set("dummy".into()),
        role: Set(role.as_str().to_string()),
        reset_token: Set(None),
        reset_token_expires: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        role,
    })
}

pub async fn create_product(
    state: &AppState,
    code: &str,
    price: i64,
    stock: i32,
    min_stock: i32,
) -> anyhow::Result<entity::products::Model> {
    let now = Utc::now();
    let product = entity::products::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        name: Set(format!("Product {code}")),
        brand: Set(Some("Acme".into())),
        category: Set(Some("Parts".into())),
        model: Set(None),
        price: Set(price),
        stock_quantity: Set(stock),
        min_stock: Set(min_stock),
        popularity: Set(0),
        tags: Set(entity::products::Tags(vec!["parts".into()])),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(product)
}

/// Checkout payload with the customer snapshot taken from the caller.
pub fn checkout_request(user: &AuthUser, items: Vec<CheckoutItem>) -> CheckoutRequest {
    CheckoutRequest {
        items,
        payment_method: "PIX".into(),
        customer: CustomerInfo {
            name: "Test Customer".into(),
            email: user.email.clone(),
            phone: "+55 11 99999-0000".into(),
            document: Some("12.345.678/0001-00".into()),
        },
        delivery: DeliveryAddress {
            street: "Rua das Flores".into(),
            number: Some("100".into()),
            complement: None,
            district: Some("Centro".into()),
            city: "São Paulo".into(),
            state: "SP".into(),
            zip: "01000-000".into(),
        },
        notes: None,
    }
}
