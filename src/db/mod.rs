use crate::domain::models::Submission;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL {database_url}"))?
        .create_if_missing(true);

    if let Some(parent) = database_file(database_url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// File path of a `sqlite:` URL, `None` for in-memory databases.
fn database_file(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn insert_submission(pool: &SqlitePool, submission: &Submission) -> Result<()> {
    let payload = serde_json::to_string(submission)?;
    sqlx::query(
        r#"
        INSERT INTO submissions (id, user_id, task_id, kind, payload, completed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(submission.id())
    .bind(submission.user_id())
    .bind(submission.task_id())
    .bind(submission.kind().as_str())
    .bind(payload)
    .bind(submission.completed_at())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_submissions(pool: &SqlitePool) -> Result<Vec<Submission>> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT payload FROM submissions ORDER BY completed_at, id")
            .fetch_all(pool)
            .await?;
    decode_all(rows)
}

pub async fn list_submissions_for_task(pool: &SqlitePool, task_id: &str) -> Result<Vec<Submission>> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT payload FROM submissions WHERE task_id = ? ORDER BY completed_at, id",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;
    decode_all(rows)
}

pub async fn list_submissions_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Submission>> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT payload FROM submissions WHERE user_id = ? ORDER BY completed_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    decode_all(rows)
}

pub async fn has_submission(pool: &SqlitePool, user_id: &str, task_id: &str) -> Result<bool> {
    let found: Option<String> = sqlx::query_scalar(
        "SELECT id FROM submissions WHERE user_id = ? AND task_id = ?",
    )
    .bind(user_id)
    .bind(task_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// True when `err` comes from the one-submission-per-user-and-task index.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

fn decode_all(rows: Vec<String>) -> Result<Vec<Submission>> {
    rows.iter()
        .map(|raw| serde_json::from_str(raw).context("corrupt submission payload"))
        .collect()
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}
