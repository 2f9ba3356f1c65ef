use crate::domain::models::Role;
use crate::middleware::throttle_login;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{self, UserSession};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub name: String,
    pub first_name: String,
    pub role: Role,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub name: String,
    pub first_name: String,
    pub role: Role,
    pub assigned_tasks: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/login",
            post(login).route_layer(from_fn_with_state(state.clone(), throttle_login)),
        )
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

async fn login(
    connect: Option<ConnectInfo<SocketAddr>>,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = connect
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let Some(user) = state.catalog.find_user_by_key(&payload.key) else {
        tracing::info!("Rejected login with an invalid access key from {}", ip);
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid access key"));
    };

    let token = session::sign_session(&user.id, user.role, &state.session_key, state.session_ttl_hours)
        .map_err(ApiError::internal)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session::session_cookie(&token, state.secure_cookies)?);

    tracing::info!("{} logged in as {}", user.full_name(), user.role.as_str());

    Ok((
        headers,
        Json(LoginResponse {
            name: user.full_name(),
            first_name: user.first_name.clone(),
            role: user.role,
        }),
    ))
}

async fn logout(State(state): State<SharedState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session::clear_cookie(state.secure_cookies));
    (StatusCode::NO_CONTENT, headers)
}

async fn me(UserSession(user, claims): UserSession) -> Json<CurrentUser> {
    Json(CurrentUser {
        name: user.full_name(),
        first_name: user.first_name.clone(),
        role: user.role,
        assigned_tasks: user.assigned_tasks,
        expires_at: claims.expires_at(),
    })
}
