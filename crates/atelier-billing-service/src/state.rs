//! Application state.

use std::sync::Arc;
use std::time::Duration;

use atelier_billing_store::RocksStore;

use crate::config::ServiceConfig;
use crate::fal::FalClient;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
///
/// Collaborator clients are constructed once from config and injected here so
/// handlers never reach for process-wide singletons and tests can swap in
/// fakes behind mock base URLs.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe client for subscription lookups (optional).
    pub stripe: Option<Arc<StripeClient>>,

    /// Generation provider client (optional).
    pub fal: Option<Arc<FalClient>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        // Create Stripe client if configured
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(
                config.stripe_api_url.clone(),
                key.clone(),
                config.stripe_webhook_secret.clone(),
            ) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - subscription detail lookups will fall back");
        }

        // Create generation client; the endpoint always has a default URL, so
        // this only fails on HTTP client construction.
        let fal = match FalClient::new(
            config.fal_api_url.clone(),
            config.fal_api_key.clone(),
            Duration::from_secs(config.generation_timeout_seconds),
        ) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create generation client");
                None
            }
        };

        if config.fal_api_key.is_none() {
            tracing::warn!("Generation provider key not configured");
        }

        Self {
            store,
            config,
            stripe,
            fal,
        }
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }
}
