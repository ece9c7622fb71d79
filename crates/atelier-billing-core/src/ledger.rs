//! Ledger entry types for atelier-billing.
//!
//! Every balance change appends exactly one immutable [`LedgerEntry`] per
//! affected credit pool. Entries use ULIDs for time-ordered IDs and are never
//! mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EntryId};

/// Which credit pool a ledger entry touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    /// Non-expiring credits from one-time purchases.
    Permanent,

    /// Per-cycle credits from an active subscription.
    Subscription,
}

/// Reason code attached to a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    /// One-time credit pack purchase.
    Purchase,

    /// Initial grant when a subscription starts.
    SubscriptionActivated,

    /// Cycle grant on subscription renewal.
    SubscriptionRenewal,

    /// Zero-out when a subscription is canceled.
    SubscriptionCanceled,

    /// Zero-out when a subscription lapses on payment failure.
    SubscriptionExpired,

    /// Deduction for an image generation.
    Generation,
}

/// An immutable audit record of one balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The account whose balance changed.
    pub account_id: AccountId,

    /// Signed credit delta. Positive = grant, negative = debit.
    pub delta: i64,

    /// Which credit pool the delta applies to.
    pub credit_type: CreditType,

    /// Why the balance changed.
    pub reason: EntryReason,

    /// Correlation metadata: external session/invoice ids, prompt context, …
    pub metadata: serde_json::Value,

    /// Total balance (both pools) after this entry was applied.
    pub balance_after: i64,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a grant entry (positive delta).
    #[must_use]
    pub fn grant(
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: EntryReason,
        metadata: serde_json::Value,
        balance_after: i64,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            delta: amount.abs(),
            credit_type,
            reason,
            metadata,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create a debit entry (negative delta).
    #[must_use]
    pub fn debit(
        account_id: AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: EntryReason,
        metadata: serde_json::Value,
        balance_after: i64,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            delta: -amount.abs(),
            credit_type,
            reason,
            metadata,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create the audit entry for a subscription zero-out.
    ///
    /// `drained` may be zero; the entry is still written so the lifecycle
    /// transition leaves a trace in the history.
    #[must_use]
    pub fn zero_out(
        account_id: AccountId,
        drained: i64,
        reason: EntryReason,
        metadata: serde_json::Value,
        balance_after: i64,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            delta: -drained.abs(),
            credit_type: CreditType::Subscription,
            reason,
            metadata,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// The two credit pools of an account, as returned by balance reads and
/// ledger mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Non-expiring credits.
    pub permanent: i64,

    /// Per-cycle subscription credits.
    pub subscription: i64,
}

impl Balances {
    /// Total spendable credits.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.permanent + self.subscription
    }
}
