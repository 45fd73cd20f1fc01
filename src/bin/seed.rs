use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Tags},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "Store Admin", "admin@example.com", "admin123", "ADMIN").await?;
    let user_id = ensure_user(&orm, "Sample Buyer", "buyer@example.com", "buyer123", "CUSTOMER").await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present (role={})", existing.role);
        return Ok(existing.id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        phone: Set(None),
        password_hash: Set(password_hash),
        role: Set(role.to_string()),
        reset_token: Set(None),
        reset_token_expires: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Created user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let products = [
        ("BRK-001", "Ceramic Brake Pad Set", "Stopline", "Brakes", 18900, 40),
        ("FLT-010", "Oil Filter HD", "Purifio", "Filters", 4500, 120),
        ("BAT-060", "12V 60Ah Battery", "VoltMax", "Electrics", 52900, 15),
        ("LMP-205", "LED Headlamp Pair", "Lumen", "Lighting", 15900, 60),
    ];

    for (code, name, brand, category, price, stock) in products {
        let exists = Products::find()
            .filter(ProdCol::Code.eq(code))
            .one(orm)
            .await?;
        if exists.is_some() {
            continue;
        }

        let now = Utc::now();
        ProductActive {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            brand: Set(Some(brand.to_string())),
            category: Set(Some(category.to_string())),
            model: Set(None),
            price: Set(price),
            stock_quantity: Set(stock),
            min_stock: Set(5),
            popularity: Set(0),
            tags: Set(Tags(vec![category.to_lowercase()])),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
