use crate::db;
use crate::domain::models::{Submission, Task, User};
use crate::domain::submission::{build_submission, SubmissionDraft};
use crate::services::remote::RemoteError;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct SubmitOutcome {
    pub submission: Submission,
    pub forwarded: bool,
    pub message: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:id", get(get_task))
        .route("/:id/submissions", post(submit))
        .with_state(state)
}

fn visible_task<'a>(state: &'a SharedState, user: &User, task_id: &str) -> Result<&'a Task, ApiError> {
    let task = state
        .catalog
        .task(task_id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "task not found"))?;
    if !user.is_admin() && !user.is_assigned(task_id) {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "task is not assigned to you"));
    }
    Ok(task)
}

async fn get_task(
    UserSession(user, _): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task = visible_task(&state, &user, &id)?;
    Ok(Json(task.clone()))
}

async fn submit(
    UserSession(user, _): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(draft): Json<SubmissionDraft>,
) -> Result<(StatusCode, Json<SubmitOutcome>), ApiError> {
    let task = visible_task(&state, &user, &id)?;

    let already = db::has_submission(&state.pool, &user.id, task.id())
        .await
        .map_err(ApiError::internal)?;
    if already {
        return Err(ApiError::new(StatusCode::CONFLICT, "task already completed"));
    }

    let submission = build_submission(task, &user, draft, Utc::now())
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    // Local copy first: it stays the source of truth if forwarding fails.
    db::insert_submission(&state.pool, &submission)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ApiError::new(StatusCode::CONFLICT, "task already completed")
            } else {
                ApiError::internal(e)
            }
        })?;
    tracing::info!(
        "Stored submission {} for task {} by {}",
        submission.id(),
        task.id(),
        user.full_name()
    );

    let (forwarded, message) = forward(&state, &submission).await;

    Ok((
        StatusCode::CREATED,
        Json(SubmitOutcome {
            submission,
            forwarded,
            message,
        }),
    ))
}

async fn forward(state: &SharedState, submission: &Submission) -> (bool, String) {
    let Some(remote) = &state.remote else {
        return (false, "Task saved locally.".to_string());
    };

    match remote.send(submission).await {
        Ok(()) => (
            true,
            "Task submitted. Your results were saved and sent.".to_string(),
        ),
        Err(RemoteError::NotConfigured(_)) => (false, "Task saved locally.".to_string()),
        Err(e) => {
            tracing::error!("Failed to forward submission {}: {}", submission.id(), e);
            (
                false,
                "Task saved locally. Sending the results to the remote server failed, \
                 so they may not appear there yet."
                    .to_string(),
            )
        }
    }
}
