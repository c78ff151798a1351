use crate::auth::jwt::JwtConfig;

use lucid_core::signing::DEFAULT_FRESHNESS_WINDOW_SECS;

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have sensible defaults suitable for
/// local development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry duration).
    pub jwt: JwtConfig,
    /// Render provider base URL.
    pub provider_api_url: String,
    /// Render provider bearer token.
    pub provider_api_key: String,
    /// Public webhook callback URL handed to the provider at submission,
    /// if this deployment is reachable from outside.
    pub provider_callback_url: Option<String>,
    /// Shared secret verifying provider webhook signatures.
    pub webhook_signing_secret: String,
    /// Freshness window for webhook timestamps, in seconds (default: `300`).
    pub webhook_freshness_window_secs: i64,
    /// Base directory for persisted render artifacts (default: `./artifacts`).
    pub artifact_root: String,
    /// Notification collaborator endpoint; outcome events are not pushed
    /// when unset.
    pub notification_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Required | Default                 |
    /// |--------------------------------|----------|-------------------------|
    /// | `HOST`                         | no       | `0.0.0.0`               |
    /// | `PORT`                         | no       | `3000`                  |
    /// | `CORS_ORIGINS`                 | no       | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`         | no       | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | no       | `30`                    |
    /// | `RENDER_API_URL`               | **yes**  | --                      |
    /// | `RENDER_API_KEY`               | **yes**  | --                      |
    /// | `RENDER_CALLBACK_URL`          | no       | unset                   |
    /// | `WEBHOOK_SIGNING_SECRET`       | **yes**  | --                      |
    /// | `WEBHOOK_FRESHNESS_WINDOW_SECS`| no       | `300`                   |
    /// | `ARTIFACT_ROOT`                | no       | `./artifacts`           |
    /// | `NOTIFICATION_URL`             | no       | unset                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let provider_api_url =
            std::env::var("RENDER_API_URL").expect("RENDER_API_URL must be set");
        let provider_api_key =
            std::env::var("RENDER_API_KEY").expect("RENDER_API_KEY must be set");
        let provider_callback_url = std::env::var("RENDER_CALLBACK_URL").ok();

        let webhook_signing_secret =
            std::env::var("WEBHOOK_SIGNING_SECRET").expect("WEBHOOK_SIGNING_SECRET must be set");
        assert!(
            !webhook_signing_secret.is_empty(),
            "WEBHOOK_SIGNING_SECRET must not be empty"
        );

        let webhook_freshness_window_secs: i64 =
            std::env::var("WEBHOOK_FRESHNESS_WINDOW_SECS")
                .unwrap_or_else(|_| DEFAULT_FRESHNESS_WINDOW_SECS.to_string())
                .parse()
                .expect("WEBHOOK_FRESHNESS_WINDOW_SECS must be a valid i64");

        let artifact_root =
            std::env::var("ARTIFACT_ROOT").unwrap_or_else(|_| "./artifacts".into());

        let notification_url = std::env::var("NOTIFICATION_URL").ok();

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            provider_api_url,
            provider_api_key,
            provider_callback_url,
            webhook_signing_secret,
            webhook_freshness_window_secs,
            artifact_root,
            notification_url,
        }
    }
}
