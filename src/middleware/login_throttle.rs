//! Per-IP throttle for access-key logins.
//!
//! Each address gets `limit` attempts inside a sliding `window`. Requests
//! without connection info (in-process callers) share one bucket.
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Clone)]
pub struct LoginThrottle {
    attempts: Arc<Mutex<HashMap<IpAddr, VecDeque<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl LoginThrottle {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            limit,
            window,
        }
    }

    /// Records an attempt at `now`. When the address is over its limit the
    /// attempt is not recorded and the time until the oldest one expires is
    /// returned.
    pub async fn try_acquire(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut attempts = self.attempts.lock().await;
        let history = attempts.entry(ip).or_default();
        while history
            .front()
            .is_some_and(|&at| now.saturating_duration_since(at) >= self.window)
        {
            history.pop_front();
        }

        if history.len() >= self.limit {
            let retry_after = history
                .front()
                .map(|&oldest| self.window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }
        history.push_back(now);
        Ok(())
    }

    /// Forgets addresses whose attempts have all left the window. Returns how
    /// many addresses are still tracked.
    pub async fn prune(&self, now: Instant) -> usize {
        let mut attempts = self.attempts.lock().await;
        attempts.retain(|_, history| {
            history
                .back()
                .is_some_and(|&at| now.saturating_duration_since(at) < self.window)
        });
        attempts.len()
    }

    pub fn spawn_pruner(&self, every: Duration) -> JoinHandle<()> {
        let throttle = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let tracked = throttle.prune(Instant::now()).await;
                tracing::debug!("Login throttle pruned, {} addresses tracked", tracked);
            }
        })
    }
}

/// Route middleware for `POST /auth/login`.
pub async fn throttle_login(
    State(state): State<SharedState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = connect
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(UNKNOWN_CLIENT);

    if let Err(retry_after) = state.login_throttle.try_acquire(ip, Instant::now()).await {
        tracing::warn!("Login attempts throttled for {}", ip);
        let mut response = ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "too many login attempts, try again later",
        )
        .into_response();
        // Round up so clients never retry a moment too early.
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        return response;
    }

    next.run(request).await
}
