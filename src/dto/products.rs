use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub code: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub model: Option<String>,
    pub price: i64,
    pub stock_quantity: i32,
    pub min_stock: Option<i32>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub model: Option<String>,
    pub price: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub min_stock: Option<i32>,
    pub popularity: Option<i32>,
    pub tags: Option<Vec<String>>,
}

/// One entry of the admin bulk price/stock update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkProductUpdate {
    pub id: Uuid,
    pub price: Option<i64>,
    pub stock_quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkUpdateRequest {
    pub updates: Vec<BulkProductUpdate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
