use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{config::AppConfig, ratelimit::RateLimiter};

/// Shared handles constructed once at process start and injected into
/// every handler; nothing here lives in module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub limiter: RateLimiter,
    pub config: Arc<AppConfig>,
}
