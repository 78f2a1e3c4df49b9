//! Fixed-window, in-memory rate limiting for checkout and download routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;
use crate::state::AppState;

/// A per-route request budget.
#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub route: &'static str,
    pub max_requests: u32,
    pub window_secs: u64,
    pub message: &'static str,
}

/// Checkout: 10 requests per 15 minutes per IP.
pub const CHECKOUT: Limit = Limit {
    route: "checkout",
    max_requests: 10,
    window_secs: 15 * 60,
    message: "Too many checkout attempts, please try again later",
};

/// Downloads: 100 requests per hour per IP.
pub const DOWNLOAD: Limit = Limit {
    route: "download",
    max_requests: 100,
    window_secs: 60 * 60,
    message: "Too many download requests, please try again later",
};

struct IpEntry {
    count: u32,
    window_start: Instant,
    window_secs: u64,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    /// route name -> (IP -> entry)
    inner: Arc<Mutex<HashMap<&'static str, HashMap<String, IpEntry>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request. Fails with the seconds left in the window once
    /// the budget is spent.
    pub async fn check(&self, limit: &Limit, ip: &str) -> Result<(), AppError> {
        let mut map = self.inner.lock().await;
        let route_map = map.entry(limit.route).or_default();
        let now = Instant::now();

        let entry = route_map.entry(ip.to_owned()).or_insert_with(|| IpEntry {
            count: 0,
            window_start: now,
            window_secs: limit.window_secs,
        });

        let elapsed = now.duration_since(entry.window_start).as_secs();
        if elapsed >= limit.window_secs {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        if entry.count <= limit.max_requests {
            return Ok(());
        }

        let retry_after = limit
            .window_secs
            .saturating_sub(now.duration_since(entry.window_start).as_secs())
            .max(1);
        Err(AppError::TooManyRequests {
            message: limit.message.to_string(),
            retry_after,
        })
    }

    /// Drops entries whose window has ended.
    pub async fn cleanup(&self) {
        let mut map = self.inner.lock().await;
        let now = Instant::now();

        for route_map in map.values_mut() {
            route_map.retain(|_, entry| {
                now.duration_since(entry.window_start).as_secs() < entry.window_secs
            });
        }

        map.retain(|_, route_map| !route_map.is_empty());
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inner.lock().await.values().map(HashMap::len).sum()
    }
}

/// Client IP: first `X-Forwarded-For` entry, then the peer address.
pub fn client_ip(request: &Request) -> String {
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_owned();
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

pub async fn checkout_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&request);
    state.rate_limiter.check(&CHECKOUT, &ip).await?;
    Ok(next.run(request).await)
}

pub async fn download_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&request);
    state.rate_limiter.check(&DOWNLOAD, &ip).await?;
    Ok(next.run(request).await)
}
