//! Shared application state.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::gateway::GatewayClient;
use crate::mailer::Mailer;
use crate::rate_limit::RateLimiter;
use crate::storage::BlobStore;

#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    pub config: Arc<Config>,
    /// Chunked file storage
    pub blobs: BlobStore,
    /// `None` when gateway keys are not configured
    pub gateway: Option<GatewayClient>,
    /// `None` when no mail relay token is configured
    pub mailer: Option<Mailer>,
    /// Shared outbound HTTP client
    pub http: reqwest::Client,
    /// Rate limiter for checkout and download routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let http = reqwest::Client::new();
        let gateway = config
            .gateway
            .as_ref()
            .map(|g| GatewayClient::new(g, http.clone()));
        let mailer = config
            .mail
            .clone()
            .map(|m| Mailer::new(m, http.clone()));

        if gateway.is_none() {
            tracing::warn!("Payment gateway keys not set; paid checkout is disabled");
        }
        if mailer.is_none() {
            tracing::warn!("Mail relay not configured; contact form emails are disabled");
        }

        Self {
            blobs: BlobStore::new(pool.clone()),
            pool,
            config: Arc::new(config),
            gateway,
            mailer,
            http,
            rate_limiter: RateLimiter::new(),
        }
    }

    /// Absolute (production) or relative link to an API path.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.config.public_base_url().trim_end_matches('/'), path)
    }
}
