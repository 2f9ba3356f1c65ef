use crate::catalog::Catalog;
use crate::middleware::LoginThrottle;
use crate::services::remote::SubmissionRemote;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub catalog: Arc<Catalog>,
    pub remote: Option<Arc<dyn SubmissionRemote>>,
    pub session_key: Vec<u8>,
    pub session_ttl_hours: i64,
    pub secure_cookies: bool,
    pub remote_results: bool,
    pub login_throttle: LoginThrottle,
}

pub type SharedState = Arc<AppState>;
