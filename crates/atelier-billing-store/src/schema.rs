//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const LEDGER_ENTRIES: &str = "ledger_entries";

    /// Index: ledger entries by account, keyed by `account_id || entry_id`.
    /// Value is empty (index only).
    pub const LEDGER_BY_ACCOUNT: &str = "ledger_by_account";

    /// Processed external billing events for idempotency, keyed by the
    /// external event id.
    pub const PROCESSED_EVENTS: &str = "processed_events";

    /// Index: payment-processor customer id -> account id.
    pub const CUSTOMERS: &str = "customers";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::LEDGER_ENTRIES,
        cf::LEDGER_BY_ACCOUNT,
        cf::PROCESSED_EVENTS,
        cf::CUSTOMERS,
    ]
}
