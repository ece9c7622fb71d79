//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/atelier-billing").
    pub data_dir: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional; without it webhook
    /// signatures are not verified, which is only acceptable in development).
    pub stripe_webhook_secret: Option<String>,

    /// Stripe API base URL (overridable for tests).
    pub stripe_api_url: String,

    /// Generation provider API base URL.
    pub fal_api_url: String,

    /// Generation provider API key (optional).
    pub fal_api_key: Option<String>,

    /// Timeout for generation provider calls, in seconds.
    pub generation_timeout_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// Generation provider secrets file structure.
#[derive(Debug, Deserialize)]
struct FalSecrets {
    api_key: String,
    #[serde(default)]
    api_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load secrets from files first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();
        let (fal_api_key, fal_api_url) = load_fal_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/atelier-billing".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_api_url: std::env::var("STRIPE_API_URL")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".into()),
            fal_api_url: fal_api_url
                .unwrap_or_else(|| "https://fal.run/fal-ai/nano-banana-pro".into()),
            fal_api_key,
            generation_timeout_seconds: std::env::var("GENERATION_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(150),
        }
    }
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "atelier-billing/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
    )
}

/// Load generation provider secrets from file or environment.
fn load_fal_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/fal.json",
        "atelier-billing/.secrets/fal.json",
        "../.secrets/fal.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<FalSecrets>(path) {
            tracing::info!(path = %path, "Loaded fal secrets from file");
            return (Some(secrets.api_key), secrets.api_url);
        }
    }

    tracing::debug!("Fal secrets file not found, using environment variables");
    (
        std::env::var("FAL_KEY").ok(),
        std::env::var("FAL_API_URL").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/atelier-billing".into(),
            service_api_key: None,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_api_url: "https://api.stripe.com/v1".into(),
            fal_api_url: "https://fal.run/fal-ai/nano-banana-pro".into(),
            fal_api_key: None,
            generation_timeout_seconds: 120,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 150,
        }
    }
}
