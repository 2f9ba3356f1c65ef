pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod error;
pub mod session;
pub mod tasks;

use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{http::StatusCode, routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/dashboard", dashboard::router(state.clone()))
        .nest("/tasks", tasks::router(state.clone()))
        .nest("/admin", admin::router(state))
}

/// Served when the roster or task catalog could not be loaded.
pub fn unavailable_routes(reason: String) -> Router {
    let health_reason = reason.clone();
    Router::new()
        .route(
            "/health",
            get(move || async move {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("configuration unavailable: {health_reason}"),
                )
            }),
        )
        .fallback(move || async move {
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("the application failed to start: {reason}"),
            )
        })
}
