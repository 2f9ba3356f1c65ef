use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub users_file: PathBuf,
    pub tasks_file: PathBuf,
    pub session_key: Vec<u8>,
    pub session_ttl_hours: i64,
    pub remote_submit_url: Option<String>,
    pub remote_results_url: Option<String>,
    pub remote_timeout: Duration,
    pub static_dir: PathBuf,
    pub secure_cookies: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let session_key_b64 = std::env::var("SESSION_KEY").context("SESSION_KEY missing")?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64.trim())
            .context("SESSION_KEY must be base64")?;
        if session_key.len() < 32 {
            bail!("SESSION_KEY must decode to at least 32 bytes");
        }

        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", 24)?;
        let remote_timeout = Duration::from_secs(parse_or("REMOTE_TIMEOUT_SECS", 15)?);

        // SECURITY: Secure cookies on any known hosting platform
        let secure_cookies = ["PRODUCTION", "RAILWAY_ENVIRONMENT", "RENDER", "FLY_APP_NAME"]
            .iter()
            .any(|v| std::env::var(v).is_ok());

        Ok(Self {
            bind_addr,
            database_url: env_or("DATABASE_URL", "sqlite://data/ux_sort.db"),
            users_file: env_or("USERS_FILE", "config/users.json").into(),
            tasks_file: env_or("TASKS_FILE", "config/tasks.json").into(),
            session_key,
            session_ttl_hours,
            remote_submit_url: optional("REMOTE_SUBMIT_URL"),
            remote_results_url: optional("REMOTE_RESULTS_URL"),
            remote_timeout,
            static_dir: env_or("STATIC_DIR", "static").into(),
            secure_cookies,
        })
    }

    pub fn has_remote(&self) -> bool {
        self.remote_submit_url.is_some() || self.remote_results_url.is_some()
    }
}

fn env_or(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        None => Ok(default),
    }
}
