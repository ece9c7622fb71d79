//! Processed-event records for webhook idempotency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A consumed external billing event.
///
/// Written once when a webhook event is claimed; the existence of the record
/// is the sole idempotency signal. The payment processor delivers events
/// at-least-once, so every webhook-driven mutation must claim its external id
/// before touching the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    /// External event identifier (checkout session id or invoice id).
    pub event_id: String,

    /// Processor event kind, for audit (e.g. `checkout.session.completed`).
    pub event_type: String,

    /// When the event was claimed.
    pub processed_at: DateTime<Utc>,
}

impl ProcessedEvent {
    /// Create a record for an event being claimed now.
    #[must_use]
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
        }
    }
}
