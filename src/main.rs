mod analytics;
mod catalog;
mod config;
mod db;
mod domain;
mod middleware;
mod services;
mod state;
mod web;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::middleware::LoginThrottle;
use crate::services::remote::{HttpRemote, SubmissionRemote};
use crate::state::SharedState;
use axum::{routing::get_service, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let app = match Catalog::load(&config.users_file, &config.tasks_file) {
        Ok(catalog) => {
            let static_dir = &config.static_dir;
            let static_handler = ServeDir::new(static_dir)
                .not_found_service(ServeFile::new(static_dir.join("index.html")));
            build_api(&config, catalog)
                .await?
                .fallback_service(get_service(static_handler))
        }
        Err(e) => {
            // Every request answers 503 with the reason until the files are fixed.
            tracing::error!("Failed to load configuration files: {}", e);
            web::unavailable_routes(e.to_string())
        }
    };

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn build_api(config: &AppConfig, catalog: Catalog) -> anyhow::Result<Router> {
    tracing::info!("Opening submission store...");
    let pool = db::connect(&config.database_url).await.map_err(|e| {
        tracing::error!("Failed to open submission store: {}", e);
        e
    })?;
    db::migrate(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        e
    })?;
    tracing::info!("Submission store ready");

    let remote: Option<Arc<dyn SubmissionRemote>> = if config.has_remote() {
        let http = HttpRemote::new(
            config.remote_submit_url.clone(),
            config.remote_results_url.clone(),
            config.remote_timeout,
        )?;
        tracing::info!(
            "Remote forwarding: submit={} results={}",
            config.remote_submit_url.is_some(),
            config.remote_results_url.is_some()
        );
        Some(Arc::new(http))
    } else {
        tracing::info!("No remote endpoints configured, results stay local");
        None
    };

    let login_throttle = LoginThrottle::new(5, Duration::from_secs(60));
    login_throttle.spawn_pruner(Duration::from_secs(600));

    let shared: SharedState = Arc::new(state::AppState {
        pool,
        catalog: Arc::new(catalog),
        remote,
        session_key: config.session_key.clone(),
        session_ttl_hours: config.session_ttl_hours,
        secure_cookies: config.secure_cookies,
        remote_results: config.remote_results_url.is_some(),
        login_throttle,
    });

    Ok(web::routes(shared))
}
