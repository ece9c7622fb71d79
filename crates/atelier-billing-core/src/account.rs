//! Account types for atelier-billing.
//!
//! This module defines the billing account with its split credit balances and
//! the subscription lifecycle state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

// ============================================================================
// Constants
// ============================================================================

/// Credits deducted per image generation.
pub const GENERATION_COST_CREDITS: i64 = 10;

/// Subscription credits granted per billing cycle.
pub const MONTHLY_SUBSCRIPTION_CREDITS: i64 = 500;

/// Fallback subscription period length in days when the payment processor
/// cannot supply period details.
pub const SUBSCRIPTION_FALLBACK_DAYS: i64 = 30;

/// Number of consecutive payment failures after which an active subscription
/// is treated as expired.
pub const PAYMENT_FAILURE_EXPIRY_ATTEMPTS: i64 = 3;

/// A billing account.
///
/// The account tracks two non-negative credit pools and the subscription
/// lifecycle. Permanent credits come from one-time pack purchases and never
/// expire; subscription credits are granted per billing cycle and are zeroed
/// when the subscription ends.
///
/// Accounts are created at signup by the identity layer; this service only
/// mutates them through ledger operations and subscription transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The account ID.
    pub account_id: AccountId,

    /// Non-expiring credits from one-time purchases. Always `>= 0`.
    pub permanent_credits: i64,

    /// Per-cycle credits from an active subscription. Always `>= 0`.
    pub subscription_credits: i64,

    /// Current subscription lifecycle state.
    pub subscription_status: SubscriptionStatus,

    /// Plan identifier of the current (or last) subscription.
    pub subscription_plan: Option<String>,

    /// Start of the current billing period.
    pub subscription_start: Option<DateTime<Utc>>,

    /// End of the current billing period.
    pub subscription_end: Option<DateTime<Utc>>,

    /// Payment-processor customer ID, linked at first checkout. Used to
    /// resolve renewal/cancellation events that reference the customer
    /// rather than the account.
    pub processor_customer_id: Option<String>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balances and no subscription.
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            permanent_credits: 0,
            subscription_credits: 0,
            subscription_status: SubscriptionStatus::None,
            subscription_plan: None,
            subscription_start: None,
            subscription_end: None,
            processor_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total spendable credits across both pools.
    #[must_use]
    pub const fn total_credits(&self) -> i64 {
        self.permanent_credits + self.subscription_credits
    }

    /// Check whether the account can cover a deduction.
    #[must_use]
    pub const fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.total_credits() >= amount
    }

    /// Check whether the subscription is currently active.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active
    }

    // ========================================================================
    // Subscription lifecycle transitions
    // ========================================================================

    /// Transition to `Active` on a successful subscription payment.
    ///
    /// Valid from every state: a fresh payment re-activates canceled and
    /// expired subscriptions.
    pub fn activate_subscription(
        &mut self,
        plan: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        self.subscription_status = SubscriptionStatus::Active;
        self.subscription_plan = Some(plan.into());
        self.subscription_start = Some(start);
        self.subscription_end = Some(end);
        self.updated_at = Utc::now();
    }

    /// Refresh the period end of an active subscription on renewal.
    ///
    /// No-op unless the subscription is `Active`.
    pub fn renew_subscription(&mut self, end: DateTime<Utc>) -> bool {
        if self.subscription_status != SubscriptionStatus::Active {
            return false;
        }
        self.subscription_end = Some(end);
        self.updated_at = Utc::now();
        true
    }

    /// Transition `Active -> Canceled`.
    ///
    /// Sets the period end to `now` and drains the subscription credit pool,
    /// returning the drained amount so the caller can record it in the
    /// ledger. Returns `None` from any other state: `Canceled` and `Expired`
    /// persist until a new payment event arrives.
    pub fn cancel_subscription(&mut self, now: DateTime<Utc>) -> Option<i64> {
        self.end_subscription(SubscriptionStatus::Canceled, now)
    }

    /// Transition `Active -> Expired` after repeated payment failures.
    ///
    /// Same zero-out contract as [`Account::cancel_subscription`].
    pub fn expire_subscription(&mut self, now: DateTime<Utc>) -> Option<i64> {
        self.end_subscription(SubscriptionStatus::Expired, now)
    }

    fn end_subscription(&mut self, status: SubscriptionStatus, now: DateTime<Utc>) -> Option<i64> {
        if self.subscription_status != SubscriptionStatus::Active {
            return None;
        }
        let drained = self.subscription_credits;
        self.subscription_credits = 0;
        self.subscription_status = status;
        self.subscription_end = Some(now);
        self.updated_at = now;
        Some(drained)
    }
}

/// Subscription lifecycle state.
///
/// `Canceled` and `Expired` are terminal in the engineering sense: nothing
/// transitions out of them except a new successful subscription payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No subscription has ever been started.
    #[default]
    None,

    /// Subscription is active; cycle credits are granted each period.
    Active,

    /// Explicitly canceled by the user.
    Canceled,

    /// Lapsed after repeated payment failures.
    Expired,
}

/// Kind of purchased plan, carried in checkout metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// One-time credit pack; grants permanent credits.
    Pack,

    /// Recurring subscription; grants cycle credits and starts the lifecycle.
    Subscription,
}

impl PlanKind {
    /// Parse the `plan_kind` metadata value; anything other than
    /// `"subscription"` is treated as a one-time pack.
    #[must_use]
    pub fn from_metadata(value: &str) -> Self {
        if value == "subscription" {
            Self::Subscription
        } else {
            Self::Pack
        }
    }
}

/// Default period end used when the processor cannot supply period details.
#[must_use]
pub fn fallback_period_end(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(SUBSCRIPTION_FALLBACK_DAYS)
}
