pub mod auth;
pub mod cache;
pub mod error;
pub mod routes;

use cache::PageCache;
use sqlx::SqlitePool;

pub struct AppState {
    pub pool: SqlitePool,
    pub cache: PageCache,
}
