use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::OrderFeedback;

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackWithOrder {
    #[serde(flatten)]
    pub feedback: OrderFeedback,
    pub order_number: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RatingCount {
    pub rating: i16,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackStats {
    pub count: i64,
    pub average_rating: f64,
    pub histogram: Vec<RatingCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackList {
    pub items: Vec<FeedbackWithOrder>,
    pub stats: FeedbackStats,
}
