//! `RocksDB` storage layer for atelier-billing.
//!
//! This crate provides persistent storage for accounts, ledger entries, and
//! processed billing events using `RocksDB` with column families for
//! efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: Primary account records, keyed by `account_id`
//! - `ledger_entries`: Ledger entries, keyed by `entry_id` (ULID)
//! - `ledger_by_account`: Index for listing entries by account
//! - `processed_events`: Consumed external event ids for idempotency
//! - `customers`: Processor customer id -> account id index
//!
//! # Concurrency
//!
//! All balance mutations for one account are serialized through a per-account
//! lock table, so the non-negative invariant holds even when a webhook grant
//! races a user-initiated debit. Mutations on different accounts do not block
//! each other. Event claims go through a dedicated claim mutex that makes
//! `claim_event` an atomic insert-if-absent.
//!
//! # Example
//!
//! ```no_run
//! use atelier_billing_store::{RocksStore, Store};
//! use atelier_billing_core::{Account, AccountId};
//!
//! let store = RocksStore::open("/tmp/atelier-billing-db").unwrap();
//!
//! let account_id = AccountId::generate();
//! let account = Account::new(account_id);
//! store.put_account(&account).unwrap();
//!
//! let balances = store.get_balances(&account_id).unwrap();
//! assert_eq!(balances.total(), 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use atelier_billing_core::{
    Account, AccountId, Balances, CreditType, EntryId, EntryReason, LedgerEntry, ProcessedEvent,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing). Compound
/// operations are atomic: either every write in the operation lands or none
/// does, and same-account operations are serialized against each other.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or update an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by account ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Get the current credit balances for an account. Read-only.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    fn get_balances(&self, account_id: &AccountId) -> Result<Balances>;

    // =========================================================================
    // Customer Index
    // =========================================================================

    /// Link a payment-processor customer id to an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn link_customer(&self, customer_id: &str, account_id: &AccountId) -> Result<()>;

    /// Resolve a payment-processor customer id to an account id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn resolve_customer(&self, customer_id: &str) -> Result<Option<AccountId>>;

    // =========================================================================
    // Ledger Reads
    // =========================================================================

    /// Get a ledger entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_entry(&self, entry_id: &EntryId) -> Result<Option<LedgerEntry>>;

    /// List ledger entries for an account, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;

    // =========================================================================
    // Event Idempotency Guard
    // =========================================================================

    /// Check whether an external event has already been processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_processed_event(&self, event_id: &str) -> Result<bool>;

    /// Attempt to claim an external event id.
    ///
    /// Returns `true` if this is the first claim (record inserted), `false`
    /// if the event was already processed. Claim-and-check is atomic: two
    /// concurrent claims of the same id yield exactly one `true`.
    ///
    /// Callers must claim before applying any webhook-driven mutation and
    /// must skip the mutation entirely on a `false` result.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn claim_event(&self, event: &ProcessedEvent) -> Result<bool>;

    // =========================================================================
    // Ledger Mutations
    // =========================================================================

    /// Add credits to the named pool and append one grant entry atomically.
    ///
    /// Returns the balances after the grant.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount` is not positive.
    /// - `StoreError::NotFound` if the account doesn't exist.
    fn add_credits(
        &self,
        account_id: &AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: EntryReason,
        metadata: serde_json::Value,
    ) -> Result<Balances>;

    /// Deduct credits, draining the subscription pool before the permanent
    /// pool, and append one debit entry per affected pool atomically.
    ///
    /// Subscription credits expire at cycle end, so they are always spent
    /// first. A failed deduction performs no mutation at all.
    ///
    /// Returns the balances after the deduction.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount` is not positive.
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientCredits` if the combined balance is too low.
    fn deduct_credits(
        &self,
        account_id: &AccountId,
        amount: i64,
        reason: EntryReason,
        metadata: serde_json::Value,
    ) -> Result<Balances>;

    // =========================================================================
    // Subscription Transitions
    // =========================================================================

    /// Apply the `Active` transition: set plan and period bounds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    fn activate_subscription(
        &self,
        account_id: &AccountId,
        plan: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()>;

    /// Refresh the period end of an active subscription.
    ///
    /// Returns `false` (no-op) if the subscription is not active.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    fn renew_subscription(&self, account_id: &AccountId, end: DateTime<Utc>) -> Result<bool>;

    /// Apply `Active -> Canceled`: zero the subscription pool and append the
    /// audit entry in one atomic batch.
    ///
    /// Returns `None` (no-op) if the subscription is not active.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    fn cancel_subscription(
        &self,
        account_id: &AccountId,
        metadata: serde_json::Value,
    ) -> Result<Option<Balances>>;

    /// Apply `Active -> Expired` after repeated payment failures. Same
    /// zero-out contract as [`Store::cancel_subscription`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    fn expire_subscription(
        &self,
        account_id: &AccountId,
        metadata: serde_json::Value,
    ) -> Result<Option<Balances>>;
}
