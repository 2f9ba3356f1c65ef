use crate::analytics::results::{self, ResultsSummary, TaskResults};
use crate::db;
use crate::domain::models::{Role, Submission, TaskKind};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{require_admin, UserSession};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultsSource {
    Local,
    Remote,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub source: Option<ResultsSource>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub assigned_tasks: Vec<String>,
    pub completed_tasks: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOverview {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(flatten)]
    pub summary: ResultsSummary,
}

#[derive(Serialize)]
pub struct ResultsOverview {
    pub source: ResultsSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub tasks: Vec<TaskOverview>,
}

#[derive(Serialize)]
pub struct TaskResultsResponse {
    pub source: ResultsSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub results: TaskResults,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/results", get(results_overview))
        .route("/results/:task_id", get(task_results))
        .with_state(state)
}

async fn list_users(
    UserSession(user, _): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AdminUser>>, ApiError> {
    require_admin(&user)?;

    let submissions = db::list_submissions(&state.pool)
        .await
        .map_err(ApiError::internal)?;

    let out = state
        .catalog
        .users()
        .iter()
        .map(|u| AdminUser {
            id: u.id.clone(),
            name: u.full_name(),
            role: u.role,
            assigned_tasks: u.assigned_tasks.clone(),
            completed_tasks: submissions.iter().filter(|s| s.user_id() == u.id).count(),
        })
        .collect();

    Ok(Json(out))
}

/// Loads submissions from the requested source. A failed remote fetch
/// falls back to the local store and reports why.
async fn load_submissions(
    state: &SharedState,
    requested: Option<ResultsSource>,
    task_id: Option<&str>,
) -> Result<(Vec<Submission>, ResultsSource, Option<String>), ApiError> {
    let default = if state.remote_results {
        ResultsSource::Remote
    } else {
        ResultsSource::Local
    };

    let mut warning = None;
    if requested.unwrap_or(default) == ResultsSource::Remote {
        match &state.remote {
            Some(remote) => match remote.fetch_all().await {
                Ok(submissions) => {
                    tracing::info!("Loaded {} submissions from remote", submissions.len());
                    return Ok((submissions, ResultsSource::Remote, None));
                }
                Err(e) => {
                    tracing::warn!("Remote results unavailable, using local data: {}", e);
                    warning = Some(format!("remote results unavailable: {e}"));
                }
            },
            None => warning = Some("no remote results endpoint configured".to_string()),
        }
    }

    let submissions = match task_id {
        Some(task_id) => db::list_submissions_for_task(&state.pool, task_id).await,
        None => db::list_submissions(&state.pool).await,
    }
    .map_err(ApiError::internal)?;
    Ok((submissions, ResultsSource::Local, warning))
}

async fn results_overview(
    UserSession(user, _): UserSession,
    State(state): State<SharedState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ResultsOverview>, ApiError> {
    require_admin(&user)?;

    let (submissions, source, warning) = load_submissions(&state, query.source, None).await?;

    let tasks = state
        .catalog
        .tasks()
        .iter()
        .map(|task| {
            let count = submissions.iter().filter(|s| s.belongs_to(task)).count();
            TaskOverview {
                kind: task.kind(),
                summary: results::summarize(&state.catalog, task, count),
            }
        })
        .collect();

    Ok(Json(ResultsOverview {
        source,
        warning,
        tasks,
    }))
}

async fn task_results(
    UserSession(user, _): UserSession,
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<TaskResultsResponse>, ApiError> {
    require_admin(&user)?;

    let task = state
        .catalog
        .task(&task_id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "task not found"))?;

    let (submissions, source, warning) = load_submissions(&state, query.source, Some(task.id())).await?;
    let results = results::aggregate(&state.catalog, task, &submissions);
    tracing::debug!(
        "Aggregated {} submissions for task {}",
        results.summary().submissions_received,
        task.id()
    );

    Ok(Json(TaskResultsResponse {
        source,
        warning,
        results,
    }))
}
