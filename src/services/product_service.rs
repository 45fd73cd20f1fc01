use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{BulkUpdateRequest, CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Tags},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProdCol::Code).ilike(pattern.clone()))
                .add(Expr::col(ProdCol::Brand).ilike(pattern)),
        );
    }
    if let Some(brand) = query.brand.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(ProdCol::Brand.eq(brand.clone()));
    }
    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(ProdCol::Category.eq(category.clone()));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::Popularity) {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::Name => ProdCol::Name,
        ProductSortBy::Popularity => ProdCol::Popularity,
    };

    let mut finder = Products::find().filter(condition);
    finder = match query.order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", Product::from(product), None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    if payload.price < 0 {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if payload.stock_quantity < 0 {
        return Err(AppError::Validation("stock must not be negative".into()));
    }

    let taken = Products::find()
        .filter(ProdCol::Code.eq(payload.code.as_str()))
        .one(&state.orm)
        .await?;
    if taken.is_some() {
        return Err(AppError::Validation("Product code is already taken".into()));
    }

    let now = Utc::now();
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        code: Set(payload.code),
        name: Set(payload.name),
        brand: Set(payload.brand),
        category: Set(payload.category),
        model: Set(payload.model),
        price: Set(payload.price),
        stock_quantity: Set(payload.stock_quantity),
        min_stock: Set(payload.min_stock.unwrap_or(0)),
        popularity: Set(0),
        tags: Set(Tags(payload.tags.unwrap_or_default())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id, "code": product.code })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ProductActive = existing.into();
    if let Some(code) = payload.code {
        active.code = Set(code);
    }
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(brand) = payload.brand {
        active.brand = Set(Some(brand));
    }
    if let Some(category) = payload.category {
        active.category = Set(Some(category));
    }
    if let Some(model) = payload.model {
        active.model = Set(Some(model));
    }
    if let Some(price) = payload.price {
        if price < 0 {
            return Err(AppError::Validation("price must not be negative".into()));
        }
        active.price = Set(price);
    }
    if let Some(stock_quantity) = payload.stock_quantity {
        active.stock_quantity = Set(stock_quantity);
    }
    if let Some(min_stock) = payload.min_stock {
        active.min_stock = Set(min_stock);
    }
    if let Some(popularity) = payload.popularity {
        active.popularity = Set(popularity);
    }
    if let Some(tags) = payload.tags {
        active.tags = Set(Tags(tags));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Admin bulk price/stock update. Applied in one transaction: an unknown id
/// rolls the whole batch back.
pub async fn bulk_update(
    state: &AppState,
    user: &AuthUser,
    payload: BulkUpdateRequest,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;

    if payload.updates.is_empty() {
        return Err(AppError::Validation("no updates given".into()));
    }

    let txn = state.orm.begin().await?;
    let mut updated = Vec::with_capacity(payload.updates.len());

    for entry in payload.updates {
        let product = Products::find_by_id(entry.id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ProductActive = product.into();
        if let Some(price) = entry.price {
            if price < 0 {
                return Err(AppError::Validation("price must not be negative".into()));
            }
            active.price = Set(price);
        }
        if let Some(stock_quantity) = entry.stock_quantity {
            active.stock_quantity = Set(stock_quantity);
        }
        active.updated_at = Set(Utc::now().into());
        updated.push(Product::from(active.update(&txn).await?));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "product_bulk_update",
        Some("products"),
        Some(serde_json::json!({ "count": updated.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Products updated",
        ProductList { items: updated },
        Some(Meta::empty()),
    ))
}

/// Products at or below their own minimum stock threshold.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(Expr::col(ProdCol::StockQuantity).lte(Expr::col(ProdCol::MinStock)))
        .order_by_asc(ProdCol::StockQuantity);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(meta),
    ))
}
