//! Server configuration loaded from the environment.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Default upload ceiling for multipart bodies (100 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Origins the storefront is served from during local development.
const DEV_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:5174",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

/// Razorpay REST endpoint.
pub const GATEWAY_API_BASE: &str = "https://api.razorpay.com/v1";

/// Payment gateway credentials.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    /// REST base URL, overridable for a local stand-in gateway
    pub api_base: String,
}

impl GatewayConfig {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            api_base: GATEWAY_API_BASE.to_string(),
        }
    }
}

/// HTTP mail relay settings used by the contact form.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_token: String,
    pub from: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub port: u16,
    /// development | production
    pub environment: String,
    /// Public storefront URL, prefixed to download links in production
    pub frontend_url: Option<String>,
    /// HS256 secret for admin tokens
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    /// HMAC secret for paid download links
    pub download_link_secret: String,
    pub download_link_ttl_hours: i64,
    pub gateway: Option<GatewayConfig>,
    /// Shared secret for webhook deliveries
    pub webhook_secret: Option<String>,
    pub recaptcha_secret: Option<String>,
    pub mail: Option<MailConfig>,
    /// Inbox that receives contact form submissions
    pub contact_inbox: String,
    pub admin_username: String,
    /// Initial admin password, hashed on first start
    pub admin_password: Option<String>,
    pub max_upload_bytes: usize,
    pub cors_allowed_origins: Vec<String>,
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Development defaults for the given database.
    pub fn local(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            port: 5000,
            environment: "development".to_string(),
            frontend_url: None,
            jwt_secret: "dev-JWT_SECRET-not-for-production".to_string(),
            jwt_expires_hours: 24 * 7,
            download_link_secret: "dev-DOWNLOAD_LINK_SECRET-not-for-production".to_string(),
            download_link_ttl_hours: 24,
            gateway: None,
            webhook_secret: None,
            recaptcha_secret: None,
            mail: None,
            contact_inbox: "contact@notevault.local".to_string(),
            admin_username: "admin@notevault.local".to_string(),
            admin_password: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_allowed_origins: Vec::new(),
        }
    }

    /// Require a secret env var: must be set and non-empty outside development.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        match non_empty(name) {
            Some(v) => Ok(v),
            None if environment == "development" => Ok(format!("dev-{name}-not-for-production")),
            None => Err(format!("{name} must be set in {environment} environment").into()),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, BoxError> {
        let database_url = non_empty("DATABASE_URL").ok_or("DATABASE_URL must be set")?;
        let environment = non_empty("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let defaults = Self::local(&database_url);

        let gateway = match (non_empty("RAZORPAY_KEY_ID"), non_empty("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(GatewayConfig {
                api_base: non_empty("RAZORPAY_API_BASE")
                    .unwrap_or_else(|| GATEWAY_API_BASE.to_string()),
                ..GatewayConfig::new(key_id, key_secret)
            }),
            _ => None,
        };

        let mail = non_empty("MAIL_API_TOKEN").map(|api_token| MailConfig {
            api_url: non_empty("MAIL_API_URL")
                .unwrap_or_else(|| "https://api.mailersend.com/v1/email".into()),
            from: non_empty("MAIL_FROM").unwrap_or_else(|| "noreply@notevault.local".into()),
            api_token,
        });

        let cors_allowed_origins = non_empty("CORS_ALLOWED_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port: parsed("PORT", defaults.port),
            frontend_url: non_empty("FRONTEND_URL"),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_expires_hours: parsed("JWT_EXPIRES_HOURS", defaults.jwt_expires_hours),
            download_link_secret: Self::require_secret("DOWNLOAD_LINK_SECRET", &environment)?,
            download_link_ttl_hours: parsed(
                "DOWNLOAD_LINK_TTL_HOURS",
                defaults.download_link_ttl_hours,
            ),
            gateway,
            webhook_secret: non_empty("RAZORPAY_WEBHOOK_SECRET"),
            recaptcha_secret: non_empty("RECAPTCHA_SECRET_KEY"),
            mail,
            contact_inbox: non_empty("CONTACT_INBOX").unwrap_or(defaults.contact_inbox),
            admin_username: non_empty("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password: non_empty("ADMIN_PASSWORD_PLAIN"),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            cors_allowed_origins,
            environment,
            database_url,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Prefix for absolute links handed to the browser. Empty outside production,
    /// where the storefront proxies `/api` itself.
    pub fn public_base_url(&self) -> &str {
        if self.is_production() {
            self.frontend_url.as_deref().unwrap_or("")
        } else {
            ""
        }
    }

    /// Origins allowed by CORS: configured ones, the frontend URL, and the
    /// local dev servers outside production.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = self.cors_allowed_origins.clone();
        if let Some(url) = &self.frontend_url {
            origins.push(url.trim_end_matches('/').to_string());
        }
        if !self.is_production() {
            origins.extend(DEV_ORIGINS.iter().map(|o| o.to_string()));
        }
        origins.sort();
        origins.dedup();
        origins
    }
}
