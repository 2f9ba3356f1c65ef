use crate::db;
use crate::domain::models::{Role, TaskSummary};
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload {
    pub first_name: String,
    pub role: Role,
    pub is_admin: bool,
    pub pending: Vec<TaskSummary>,
    pub completed: Vec<TaskSummary>,
}

pub fn router(state: SharedState) -> Router {
    Router::new().route("/", get(dashboard)).with_state(state)
}

async fn dashboard(
    UserSession(user, _): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<DashboardPayload>, StatusCode> {
    let done: HashSet<String> = db::list_submissions_for_user(&state.pool, &user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load submissions for dashboard: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .into_iter()
        .map(|s| s.task_id().to_string())
        .collect();

    let (completed, pending): (Vec<_>, Vec<_>) = state
        .catalog
        .tasks_for(&user)
        .into_iter()
        .map(|t| t.summary())
        .partition(|t| done.contains(&t.id));

    Ok(Json(DashboardPayload {
        first_name: user.first_name.clone(),
        role: user.role,
        is_admin: user.is_admin(),
        pending,
        completed,
    }))
}
