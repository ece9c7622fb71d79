//! Billing webhook handler and event processor.
//!
//! The payment processor delivers signed events at-least-once. The handler
//! rejects only signature and parse failures; once a payload is verified it
//! is always acknowledged with a success status, even when internal
//! processing fails. Redelivery is deduplicated by the processed-event guard,
//! so acknowledging a failed application is safe and prevents retry storms.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use atelier_billing_core::{
    fallback_period_end, AccountId, CreditType, EntryReason, PlanKind, ProcessedEvent,
    MONTHLY_SUBSCRIPTION_CREDITS, PAYMENT_FAILURE_EXPIRY_ATTEMPTS,
};
use atelier_billing_store::Store;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::WebhookEvent;

/// Webhook acknowledgment body.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,
}

/// Handle payment-processor webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Verify the signature before anything else. A missing or invalid
    // signature is the only rejection the sender ever sees besides a
    // malformed payload.
    if let Some(stripe) = state.stripe.as_ref().filter(|s| s.has_webhook_secret()) {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

        stripe.verify_webhook_signature(&body, signature).map_err(|e| {
            tracing::warn!(error = %e, "Invalid Stripe webhook signature");
            ApiError::BadRequest("Invalid webhook signature".into())
        })?;
    } else {
        // No webhook secret configured - skip verification (development mode)
        tracing::warn!("Stripe webhook secret not configured - skipping signature verification");
    }

    let webhook: WebhookEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %webhook.event_type,
        event_id = %webhook.id,
        "Received billing webhook"
    );

    // Past this point the event is acknowledged no matter what: internal
    // failures are logged and absorbed rather than bounced back to the
    // processor, which would redeliver an event the guard may have already
    // consumed.
    if let Err(e) = dispatch_event(&state, &webhook).await {
        tracing::error!(
            event_type = %webhook.event_type,
            event_id = %webhook.id,
            error = %e,
            "Webhook processing failed; event acknowledged anyway"
        );
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Route a verified event to its handler.
async fn dispatch_event(state: &AppState, webhook: &WebhookEvent) -> Result<(), ApiError> {
    match webhook.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(state, &webhook.data.object).await,
        "invoice.payment_succeeded" => handle_invoice_paid(state, &webhook.data.object),
        "customer.subscription.deleted" => handle_subscription_deleted(state, &webhook.data.object),
        "invoice.payment_failed" => handle_payment_failed(state, &webhook.data.object),
        _ => {
            tracing::debug!(event_type = %webhook.event_type, "Unhandled billing event");
            Ok(())
        }
    }
}

// ============================================================================
// Event Handlers
// ============================================================================

/// A completed checkout: grant the purchased credits exactly once and, for
/// subscription plans, start the subscription lifecycle.
async fn handle_checkout_completed(
    state: &AppState,
    data: &serde_json::Value,
) -> Result<(), ApiError> {
    let session_id = data
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing checkout session id".into()))?;

    let payment_status = data
        .get("payment_status")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    if payment_status != "paid" {
        tracing::info!(
            session_id = %session_id,
            payment_status = %payment_status,
            "Checkout session not paid yet, skipping"
        );
        return Ok(());
    }

    let null = serde_json::Value::Null;
    let metadata = data.get("metadata").unwrap_or(&null);

    let account_id: AccountId = metadata
        .get("account_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing account_id in session metadata".into()))?
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account_id in session metadata".into()))?;

    let credits = metadata
        .get("credits")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing credits in session metadata".into()))?;

    let plan_id = metadata
        .get("plan_id")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    let plan_kind = metadata
        .get("plan_kind")
        .and_then(|v| v.as_str())
        .map_or(PlanKind::Pack, PlanKind::from_metadata);

    // The session id is the idempotency key: a redelivered webhook for the
    // same checkout must not double-credit.
    let claimed = state
        .store
        .claim_event(&ProcessedEvent::new(session_id, "checkout.session.completed"))?;

    if !claimed {
        tracing::info!(
            session_id = %session_id,
            "Checkout session already processed, skipping"
        );
        return Ok(());
    }

    let (credit_type, reason) = match plan_kind {
        PlanKind::Subscription => (CreditType::Subscription, EntryReason::SubscriptionActivated),
        PlanKind::Pack => (CreditType::Permanent, EntryReason::Purchase),
    };

    let amount_total = data.get("amount_total").and_then(serde_json::Value::as_i64);
    let currency = data.get("currency").and_then(|v| v.as_str()).unwrap_or("usd");

    let balances = state.store.add_credits(
        &account_id,
        credits,
        credit_type,
        reason,
        serde_json::json!({
            "session_id": session_id,
            "plan_id": plan_id,
            "amount_total": amount_total,
            "currency": currency,
            "source": "stripe-webhook",
        }),
    )?;

    tracing::info!(
        account_id = %account_id,
        session_id = %session_id,
        credits = credits,
        credit_type = ?credit_type,
        total = balances.total(),
        "Credits granted from checkout"
    );

    // Remember the processor's customer so later renewal/cancellation events
    // can be resolved without a provider round-trip.
    if let Some(customer_id) = data.get("customer").and_then(|v| v.as_str()) {
        state.store.link_customer(customer_id, &account_id)?;
    }

    if plan_kind == PlanKind::Subscription {
        let subscription_id = data.get("subscription").and_then(|v| v.as_str());
        let (start, end) = resolve_subscription_period(state, subscription_id).await;
        state
            .store
            .activate_subscription(&account_id, plan_id, start, end)?;

        tracing::info!(
            account_id = %account_id,
            plan_id = %plan_id,
            period_end = %end,
            "Subscription activated"
        );
    }

    Ok(())
}

/// A paid renewal invoice: grant the cycle allotment once and refresh the
/// period end.
fn handle_invoice_paid(state: &AppState, data: &serde_json::Value) -> Result<(), ApiError> {
    let billing_reason = data
        .get("billing_reason")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    // The first invoice of a subscription is billed through the checkout
    // flow; only cycle renewals grant credits here.
    if billing_reason != "subscription_cycle" {
        tracing::debug!(billing_reason = %billing_reason, "Invoice is not a renewal, skipping");
        return Ok(());
    }

    let invoice_id = data
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing invoice id".into()))?;

    let Some(account_id) = resolve_account(state, data)? else {
        tracing::warn!(invoice_id = %invoice_id, "No account linked to invoice customer");
        return Ok(());
    };

    let claimed = state
        .store
        .claim_event(&ProcessedEvent::new(invoice_id, "invoice.payment_succeeded"))?;

    if !claimed {
        tracing::info!(invoice_id = %invoice_id, "Renewal invoice already processed, skipping");
        return Ok(());
    }

    let amount_paid = data.get("amount_paid").and_then(serde_json::Value::as_i64);
    let currency = data.get("currency").and_then(|v| v.as_str()).unwrap_or("usd");

    let balances = state.store.add_credits(
        &account_id,
        MONTHLY_SUBSCRIPTION_CREDITS,
        CreditType::Subscription,
        EntryReason::SubscriptionRenewal,
        serde_json::json!({
            "invoice_id": invoice_id,
            "amount_paid": amount_paid,
            "currency": currency,
            "source": "stripe-webhook",
        }),
    )?;

    let end = invoice_period_end(data).unwrap_or_else(|| fallback_period_end(Utc::now()));
    if !state.store.renew_subscription(&account_id, end)? {
        tracing::warn!(
            account_id = %account_id,
            invoice_id = %invoice_id,
            "Renewal arrived for a non-active subscription"
        );
    }

    tracing::info!(
        account_id = %account_id,
        invoice_id = %invoice_id,
        credits = MONTHLY_SUBSCRIPTION_CREDITS,
        subscription = balances.subscription,
        period_end = %end,
        "Subscription renewal credits granted"
    );

    Ok(())
}

/// An explicit cancellation: zero the cycle credits and close the lifecycle.
///
/// There is no external idempotency key here; the transition itself is
/// idempotent because `Canceled` is only reachable from `Active`.
fn handle_subscription_deleted(state: &AppState, data: &serde_json::Value) -> Result<(), ApiError> {
    let subscription_id = data.get("id").and_then(|v| v.as_str()).unwrap_or("unknown");

    let Some(account_id) = resolve_account(state, data)? else {
        tracing::warn!(
            subscription_id = %subscription_id,
            "No account linked to deleted subscription's customer"
        );
        return Ok(());
    };

    let outcome = state.store.cancel_subscription(
        &account_id,
        serde_json::json!({
            "subscription_id": subscription_id,
            "source": "stripe-webhook",
        }),
    )?;

    match outcome {
        Some(balances) => tracing::info!(
            account_id = %account_id,
            subscription_id = %subscription_id,
            remaining_permanent = balances.permanent,
            "Subscription canceled, cycle credits zeroed"
        ),
        None => tracing::info!(
            account_id = %account_id,
            subscription_id = %subscription_id,
            "Cancellation for non-active subscription, no-op"
        ),
    }

    Ok(())
}

/// A failed renewal payment: after the final retry the subscription lapses.
///
/// Earlier attempts are logged no-ops and intentionally do not claim the
/// invoice id, so the eventual threshold delivery still finds the key free.
fn handle_payment_failed(state: &AppState, data: &serde_json::Value) -> Result<(), ApiError> {
    if data.get("subscription").and_then(|v| v.as_str()).is_none() {
        tracing::debug!("Payment failure without subscription, skipping");
        return Ok(());
    }

    let invoice_id = data
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing invoice id".into()))?;

    let attempt_count = data
        .get("attempt_count")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0);

    if attempt_count < PAYMENT_FAILURE_EXPIRY_ATTEMPTS {
        tracing::info!(
            invoice_id = %invoice_id,
            attempt_count = attempt_count,
            "Subscription payment failed, awaiting further retries"
        );
        return Ok(());
    }

    let Some(account_id) = resolve_account(state, data)? else {
        tracing::warn!(invoice_id = %invoice_id, "No account linked to failing invoice's customer");
        return Ok(());
    };

    let claimed = state
        .store
        .claim_event(&ProcessedEvent::new(invoice_id, "invoice.payment_failed"))?;

    if !claimed {
        tracing::info!(invoice_id = %invoice_id, "Payment failure already processed, skipping");
        return Ok(());
    }

    let outcome = state.store.expire_subscription(
        &account_id,
        serde_json::json!({
            "invoice_id": invoice_id,
            "attempt_count": attempt_count,
            "source": "stripe-webhook",
        }),
    )?;

    match outcome {
        Some(_) => tracing::warn!(
            account_id = %account_id,
            invoice_id = %invoice_id,
            attempt_count = attempt_count,
            "Subscription expired after repeated payment failures"
        ),
        None => tracing::info!(
            account_id = %account_id,
            invoice_id = %invoice_id,
            "Payment failure for non-active subscription, no-op"
        ),
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolve the account behind an event's `customer` field.
fn resolve_account(
    state: &AppState,
    data: &serde_json::Value,
) -> Result<Option<AccountId>, ApiError> {
    let Some(customer_id) = data.get("customer").and_then(|v| v.as_str()) else {
        return Ok(None);
    };
    Ok(state.store.resolve_customer(customer_id)?)
}

/// Fetch the subscription period from the processor, degrading to a 30-day
/// window when details are unavailable. The degraded path is deliberate
/// best-effort: the next renewal webhook corrects the period end.
async fn resolve_subscription_period(
    state: &AppState,
    subscription_id: Option<&str>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();

    if let (Some(stripe), Some(subscription_id)) = (&state.stripe, subscription_id) {
        match stripe.get_subscription(subscription_id).await {
            Ok(subscription) => {
                let start = subscription
                    .current_period_start
                    .and_then(unix_timestamp)
                    .unwrap_or(now);
                if let Some(end) = subscription.current_period_end.and_then(unix_timestamp) {
                    return (start, end);
                }
                tracing::warn!(
                    subscription_id = %subscription_id,
                    "Subscription details missing period end, using fallback window"
                );
            }
            Err(e) => {
                tracing::warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Failed to fetch subscription details, using fallback window"
                );
            }
        }
    } else {
        tracing::warn!("No subscription details available, using fallback window");
    }

    (now, fallback_period_end(now))
}

/// Read the period end from a renewal invoice's first line item.
fn invoice_period_end(data: &serde_json::Value) -> Option<DateTime<Utc>> {
    data.get("lines")
        .and_then(|l| l.get("data"))
        .and_then(|d| d.get(0))
        .and_then(|line| line.get("period"))
        .and_then(|p| p.get("end"))
        .or_else(|| data.get("period_end"))
        .and_then(serde_json::Value::as_i64)
        .and_then(unix_timestamp)
}

/// Convert Unix seconds to a UTC timestamp.
fn unix_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
