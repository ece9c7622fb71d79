//! Stripe API types.

use serde::Deserialize;

/// Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID (`evt_...`).
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object (checkout session, invoice, subscription, ...).
    ///
    /// Left as raw JSON: each event kind carries a different object shape
    /// and the processor only reads a handful of fields from each.
    pub object: serde_json::Value,
}

/// Stripe subscription object (the fields the processor needs).
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// Subscription ID (`sub_...`).
    pub id: String,
    /// Subscription status.
    #[serde(default)]
    pub status: Option<String>,
    /// Start of the current billing period (Unix seconds).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// End of the current billing period (Unix seconds).
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}
