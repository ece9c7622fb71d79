//! Core types for atelier-billing.
//!
//! This crate provides the foundational types used throughout the Atelier
//! billing platform:
//!
//! - **Identifiers**: `AccountId`, `EntryId`
//! - **Accounts**: `Account`, `SubscriptionStatus`, `PlanKind`
//! - **Ledger**: `LedgerEntry`, `CreditType`, `EntryReason`, `Balances`
//! - **Events**: `ProcessedEvent`
//!
//! # Credit Model
//!
//! An account holds two non-negative credit pools:
//!
//! - **Permanent credits** from one-time pack purchases; never expire.
//! - **Subscription credits** granted per billing cycle; zeroed when the
//!   subscription ends, and therefore always spent before permanent credits.
//!
//! One image generation costs [`GENERATION_COST_CREDITS`] credits, debited
//! only after the generation provider has returned images.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod event;
pub mod ids;
pub mod ledger;

pub use account::{
    fallback_period_end, Account, PlanKind, SubscriptionStatus, GENERATION_COST_CREDITS,
    MONTHLY_SUBSCRIPTION_CREDITS, PAYMENT_FAILURE_EXPIRY_ATTEMPTS, SUBSCRIPTION_FALLBACK_DAYS,
};
pub use error::{BillingError, Result};
pub use event::ProcessedEvent;
pub use ids::{AccountId, EntryId, IdError};
pub use ledger::{Balances, CreditType, EntryReason, LedgerEntry};
