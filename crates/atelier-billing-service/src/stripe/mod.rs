//! Stripe integration: API client and webhook payload types.

pub mod client;
pub mod types;

pub use client::{StripeClient, StripeError};
pub use types::{StripeSubscription, WebhookEvent, WebhookEventData};
