//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use atelier_billing_core::{
    Account, AccountId, Balances, CreditType, EntryId, EntryReason, LedgerEntry, ProcessedEvent,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,

    /// Per-account mutation locks. The account record is the unit of mutual
    /// exclusion: every read-modify-write of one account holds its lock, so
    /// a webhook grant and a user debit on the same account serialize while
    /// different accounts proceed in parallel.
    account_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,

    /// Serializes event claims so check-then-insert is atomic.
    claim_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            account_locks: Mutex::new(HashMap::new()),
            claim_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Get the mutation lock for an account.
    fn account_lock(&self, account_id: &AccountId) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.account_locks);
        Arc::clone(locks.entry(*account_id).or_default())
    }

    /// Load an account or fail with `NotFound`.
    fn require_account(&self, account_id: &AccountId) -> Result<Account> {
        self.get_account(account_id)?.ok_or(StoreError::NotFound {
            entity: "account",
            id: account_id.to_string(),
        })
    }

    /// Stage an account write into a batch.
    fn batch_put_account(&self, batch: &mut WriteBatch, account: &Account) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let value = Self::serialize(account)?;
        batch.put_cf(&cf, keys::account_key(&account.account_id), value);
        Ok(())
    }

    /// Stage a ledger entry and its account index into a batch.
    fn batch_put_entry(&self, batch: &mut WriteBatch, entry: &LedgerEntry) -> Result<()> {
        let cf_entries = self.cf(cf::LEDGER_ENTRIES)?;
        let cf_by_account = self.cf(cf::LEDGER_BY_ACCOUNT)?;
        let value = Self::serialize(entry)?;
        batch.put_cf(&cf_entries, keys::entry_key(&entry.id), value);
        batch.put_cf(
            &cf_by_account,
            keys::account_entry_key(&entry.account_id, &entry.id),
            [],
        );
        Ok(())
    }

    /// Commit a batch.
    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

/// Acquire a mutex, recovering from poisoning.
///
/// A poisoned lock only means another thread panicked while holding it; the
/// guarded state lives in RocksDB, not behind the mutex, so recovery is safe.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.account_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(account_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_balances(&self, account_id: &AccountId) -> Result<Balances> {
        let account = self.require_account(account_id)?;
        Ok(Balances {
            permanent: account.permanent_credits,
            subscription: account.subscription_credits,
        })
    }

    // =========================================================================
    // Customer Index
    // =========================================================================

    fn link_customer(&self, customer_id: &str, account_id: &AccountId) -> Result<()> {
        let cf = self.cf(cf::CUSTOMERS)?;
        self.db
            .put_cf(&cf, keys::customer_key(customer_id), account_id.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn resolve_customer(&self, customer_id: &str) -> Result<Option<AccountId>> {
        let cf = self.cf(cf::CUSTOMERS)?;
        let value = self
            .db
            .get_cf(&cf, keys::customer_key(customer_id))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match value {
            Some(bytes) => {
                let bytes: [u8; 16] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Serialization("customer index value is not 16 bytes".into())
                })?;
                Ok(Some(AccountId::from_uuid(uuid_from_bytes(bytes))))
            }
            None => Ok(None),
        }
    }

    // =========================================================================
    // Ledger Reads
    // =========================================================================

    fn get_entry(&self, entry_id: &EntryId) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(cf::LEDGER_ENTRIES)?;
        let key = keys::entry_key(entry_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_entries_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_by_account = self.cf(cf::LEDGER_BY_ACCOUNT)?;
        let prefix = keys::account_entries_prefix(account_id);

        let iter = self.db.iterator_cf(
            &cf_by_account,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // Collect all matching keys first; ULIDs are naturally time-ordered,
        // so reversing yields newest first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        all_keys.reverse();

        let mut entries = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if entries.len() >= limit {
                break;
            }

            let entry_id = keys::extract_entry_id_from_account_key(&key);
            if let Some(entry) = self.get_entry(&entry_id)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    // =========================================================================
    // Event Idempotency Guard
    // =========================================================================

    fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        let key = keys::processed_event_key(event_id);

        let exists = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        Ok(exists)
    }

    fn claim_event(&self, event: &ProcessedEvent) -> Result<bool> {
        let _guard = lock(&self.claim_lock);

        if self.has_processed_event(&event.event_id)? {
            return Ok(false);
        }

        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        let key = keys::processed_event_key(&event.event_id);
        let value = Self::serialize(event)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    // =========================================================================
    // Ledger Mutations
    // =========================================================================

    fn add_credits(
        &self,
        account_id: &AccountId,
        amount: i64,
        credit_type: CreditType,
        reason: EntryReason,
        metadata: serde_json::Value,
    ) -> Result<Balances> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let account_lock = self.account_lock(account_id);
        let _guard = lock(&account_lock);

        let mut account = self.require_account(account_id)?;

        match credit_type {
            CreditType::Permanent => account.permanent_credits += amount,
            CreditType::Subscription => account.subscription_credits += amount,
        }
        account.updated_at = Utc::now();

        let entry = LedgerEntry::grant(
            *account_id,
            amount,
            credit_type,
            reason,
            metadata,
            account.total_credits(),
        );

        let mut batch = WriteBatch::default();
        self.batch_put_account(&mut batch, &account)?;
        self.batch_put_entry(&mut batch, &entry)?;
        self.write(batch)?;

        tracing::debug!(
            account_id = %account_id,
            amount = amount,
            credit_type = ?credit_type,
            reason = ?reason,
            entry_id = %entry.id,
            "Credits granted"
        );

        Ok(Balances {
            permanent: account.permanent_credits,
            subscription: account.subscription_credits,
        })
    }

    fn deduct_credits(
        &self,
        account_id: &AccountId,
        amount: i64,
        reason: EntryReason,
        metadata: serde_json::Value,
    ) -> Result<Balances> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let account_lock = self.account_lock(account_id);
        let _guard = lock(&account_lock);

        let mut account = self.require_account(account_id)?;

        let balance = account.total_credits();
        if balance < amount {
            // Fail before any write: a rejected deduction leaves both the
            // balance and the ledger untouched.
            return Err(StoreError::InsufficientCredits {
                balance,
                required: amount,
            });
        }

        // Subscription credits expire at cycle end, so drain them first.
        let from_subscription = amount.min(account.subscription_credits);
        let from_permanent = amount - from_subscription;

        account.subscription_credits -= from_subscription;
        account.permanent_credits -= from_permanent;
        account.updated_at = Utc::now();

        let mut batch = WriteBatch::default();
        let mut running = balance;

        if from_subscription > 0 {
            running -= from_subscription;
            let entry = LedgerEntry::debit(
                *account_id,
                from_subscription,
                CreditType::Subscription,
                reason,
                metadata.clone(),
                running,
            );
            self.batch_put_entry(&mut batch, &entry)?;
        }
        if from_permanent > 0 {
            running -= from_permanent;
            let entry = LedgerEntry::debit(
                *account_id,
                from_permanent,
                CreditType::Permanent,
                reason,
                metadata,
                running,
            );
            self.batch_put_entry(&mut batch, &entry)?;
        }

        self.batch_put_account(&mut batch, &account)?;
        self.write(batch)?;

        tracing::debug!(
            account_id = %account_id,
            amount = amount,
            from_subscription = from_subscription,
            from_permanent = from_permanent,
            reason = ?reason,
            "Credits deducted"
        );

        Ok(Balances {
            permanent: account.permanent_credits,
            subscription: account.subscription_credits,
        })
    }

    // =========================================================================
    // Subscription Transitions
    // =========================================================================

    fn activate_subscription(
        &self,
        account_id: &AccountId,
        plan: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let account_lock = self.account_lock(account_id);
        let _guard = lock(&account_lock);

        let mut account = self.require_account(account_id)?;
        account.activate_subscription(plan, start, end);
        self.put_account(&account)
    }

    fn renew_subscription(&self, account_id: &AccountId, end: DateTime<Utc>) -> Result<bool> {
        let account_lock = self.account_lock(account_id);
        let _guard = lock(&account_lock);

        let mut account = self.require_account(account_id)?;
        if !account.renew_subscription(end) {
            return Ok(false);
        }
        self.put_account(&account)?;
        Ok(true)
    }

    fn cancel_subscription(
        &self,
        account_id: &AccountId,
        metadata: serde_json::Value,
    ) -> Result<Option<Balances>> {
        self.end_subscription(account_id, EntryReason::SubscriptionCanceled, metadata)
    }

    fn expire_subscription(
        &self,
        account_id: &AccountId,
        metadata: serde_json::Value,
    ) -> Result<Option<Balances>> {
        self.end_subscription(account_id, EntryReason::SubscriptionExpired, metadata)
    }
}

impl RocksStore {
    /// Shared `Active -> Canceled/Expired` implementation: state transition,
    /// subscription-pool zero-out, and audit entry in one batch.
    fn end_subscription(
        &self,
        account_id: &AccountId,
        reason: EntryReason,
        metadata: serde_json::Value,
    ) -> Result<Option<Balances>> {
        let account_lock = self.account_lock(account_id);
        let _guard = lock(&account_lock);

        let mut account = self.require_account(account_id)?;
        let now = Utc::now();

        let drained = match reason {
            EntryReason::SubscriptionExpired => account.expire_subscription(now),
            _ => account.cancel_subscription(now),
        };

        let Some(drained) = drained else {
            return Ok(None);
        };

        let entry = LedgerEntry::zero_out(
            *account_id,
            drained,
            reason,
            metadata,
            account.total_credits(),
        );

        let mut batch = WriteBatch::default();
        self.batch_put_account(&mut batch, &account)?;
        self.batch_put_entry(&mut batch, &entry)?;
        self.write(batch)?;

        tracing::info!(
            account_id = %account_id,
            drained = drained,
            reason = ?reason,
            "Subscription ended, cycle credits zeroed"
        );

        Ok(Some(Balances {
            permanent: account.permanent_credits,
            subscription: account.subscription_credits,
        }))
    }
}

/// Rebuild a UUID from raw bytes stored in the customer index.
fn uuid_from_bytes(bytes: [u8; 16]) -> uuid::Uuid {
    uuid::Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn create_account(store: &RocksStore, permanent: i64, subscription: i64) -> AccountId {
        let account_id = AccountId::generate();
        let mut account = Account::new(account_id);
        account.permanent_credits = permanent;
        account.subscription_credits = subscription;
        store.put_account(&account).unwrap();
        account_id
    }

    #[test]
    fn account_crud() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 50, 0);

        let retrieved = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(retrieved.permanent_credits, 50);

        let balances = store.get_balances(&account_id).unwrap();
        assert_eq!(balances.permanent, 50);
        assert_eq!(balances.subscription, 0);
        assert_eq!(balances.total(), 50);
    }

    #[test]
    fn balances_for_missing_account() {
        let (store, _dir) = create_test_store();
        let result = store.get_balances(&AccountId::generate());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn add_credits_appends_entry() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 0, 0);

        let balances = store
            .add_credits(
                &account_id,
                100,
                CreditType::Permanent,
                EntryReason::Purchase,
                serde_json::json!({ "session_id": "cs_test_1" }),
            )
            .unwrap();

        assert_eq!(balances.permanent, 100);

        let entries = store.list_entries_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delta, 100);
        assert_eq!(entries[0].balance_after, 100);
        assert_eq!(entries[0].metadata["session_id"], "cs_test_1");
    }

    #[test]
    fn add_credits_rejects_non_positive_amounts() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 0, 0);

        for amount in [0, -5] {
            let result = store.add_credits(
                &account_id,
                amount,
                CreditType::Permanent,
                EntryReason::Purchase,
                serde_json::Value::Null,
            );
            assert!(matches!(result, Err(StoreError::InvalidAmount(_))));
        }
    }

    #[test]
    fn add_credits_unknown_account() {
        let (store, _dir) = create_test_store();
        let result = store.add_credits(
            &AccountId::generate(),
            100,
            CreditType::Permanent,
            EntryReason::Purchase,
            serde_json::Value::Null,
        );
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn deduct_drains_subscription_pool_first() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 20, 8);

        let balances = store
            .deduct_credits(
                &account_id,
                10,
                EntryReason::Generation,
                serde_json::Value::Null,
            )
            .unwrap();

        // 8 from subscription, remaining 2 from permanent.
        assert_eq!(balances.subscription, 0);
        assert_eq!(balances.permanent, 18);

        let entries = store.list_entries_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 2);
        let deltas: Vec<(CreditType, i64)> =
            entries.iter().map(|e| (e.credit_type, e.delta)).collect();
        assert!(deltas.contains(&(CreditType::Subscription, -8)));
        assert!(deltas.contains(&(CreditType::Permanent, -2)));
    }

    #[test]
    fn deduct_within_subscription_pool_leaves_permanent_untouched() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 20, 30);

        let balances = store
            .deduct_credits(
                &account_id,
                10,
                EntryReason::Generation,
                serde_json::Value::Null,
            )
            .unwrap();

        assert_eq!(balances.subscription, 20);
        assert_eq!(balances.permanent, 20);

        // Only the subscription pool was touched, so only one entry.
        let entries = store.list_entries_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].credit_type, CreditType::Subscription);
        assert_eq!(entries[0].delta, -10);
    }

    #[test]
    fn insufficient_credits_leaves_no_trace() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 5, 0);

        let result = store.deduct_credits(
            &account_id,
            10,
            EntryReason::Generation,
            serde_json::Value::Null,
        );

        assert!(matches!(
            result,
            Err(StoreError::InsufficientCredits {
                balance: 5,
                required: 10
            })
        ));

        // Balance unchanged, no ledger entry created.
        let balances = store.get_balances(&account_id).unwrap();
        assert_eq!(balances.permanent, 5);
        assert_eq!(balances.subscription, 0);
        assert!(store
            .list_entries_by_account(&account_id, 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn grant_then_deduct_round_trip() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 25, 0);

        store
            .add_credits(
                &account_id,
                40,
                CreditType::Permanent,
                EntryReason::Purchase,
                serde_json::Value::Null,
            )
            .unwrap();
        let balances = store
            .deduct_credits(
                &account_id,
                40,
                EntryReason::Generation,
                serde_json::Value::Null,
            )
            .unwrap();

        assert_eq!(balances.permanent, 25);

        let entries = store.list_entries_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().map(|e| e.delta).sum::<i64>(), 0);
    }

    #[test]
    fn concurrent_deductions_never_go_negative() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let account_id = create_account(&store, 50, 0);

        // 20 threads race to deduct 10 each from a balance of 50: exactly 5
        // can succeed.
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .deduct_credits(
                            &account_id,
                            10,
                            EntryReason::Generation,
                            serde_json::Value::Null,
                        )
                        .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .filter(|h| *h.join().unwrap())
            .count();

        assert_eq!(successes, 5);
        let balances = store.get_balances(&account_id).unwrap();
        assert_eq!(balances.total(), 0);
    }

    #[test]
    fn claim_event_is_first_writer_wins() {
        let (store, _dir) = create_test_store();

        let event = ProcessedEvent::new("cs_test_42", "checkout.session.completed");
        assert!(store.claim_event(&event).unwrap());
        assert!(!store.claim_event(&event).unwrap());
        assert!(store.has_processed_event("cs_test_42").unwrap());
        assert!(!store.has_processed_event("cs_test_43").unwrap());
    }

    #[test]
    fn concurrent_claims_yield_one_winner() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let event = ProcessedEvent::new("in_race_1", "invoice.payment_succeeded");
                    store.claim_event(&event).unwrap()
                })
            })
            .collect();

        let winners = handles.into_iter().filter(|h| h.join().unwrap()).count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn cancel_subscription_zeroes_and_audits() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 15, 200);
        store
            .activate_subscription(&account_id, "studio-monthly", Utc::now(), Utc::now())
            .unwrap();

        let balances = store
            .cancel_subscription(&account_id, serde_json::json!({ "source": "webhook" }))
            .unwrap()
            .unwrap();

        assert_eq!(balances.subscription, 0);
        assert_eq!(balances.permanent, 15);

        let entries = store.list_entries_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delta, -200);
        assert_eq!(entries[0].reason, EntryReason::SubscriptionCanceled);

        // Redelivery is a no-op: the subscription is no longer active.
        assert!(store
            .cancel_subscription(&account_id, serde_json::Value::Null)
            .unwrap()
            .is_none());
        assert_eq!(store.list_entries_by_account(&account_id, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn expire_subscription_mirrors_cancellation() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 0, 120);
        store
            .activate_subscription(&account_id, "studio-monthly", Utc::now(), Utc::now())
            .unwrap();

        let balances = store
            .expire_subscription(&account_id, serde_json::Value::Null)
            .unwrap()
            .unwrap();

        assert_eq!(balances.subscription, 0);
        let account = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(
            account.subscription_status,
            atelier_billing_core::SubscriptionStatus::Expired
        );
    }

    #[test]
    fn renew_refreshes_active_subscription_only() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 0, 0);

        assert!(!store.renew_subscription(&account_id, Utc::now()).unwrap());

        store
            .activate_subscription(&account_id, "studio-monthly", Utc::now(), Utc::now())
            .unwrap();
        let end = Utc::now() + chrono::Duration::days(30);
        assert!(store.renew_subscription(&account_id, end).unwrap());

        let account = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(account.subscription_end, Some(end));
    }

    #[test]
    fn customer_index_roundtrip() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 0, 0);

        assert!(store.resolve_customer("cus_123").unwrap().is_none());

        store.link_customer("cus_123", &account_id).unwrap();
        assert_eq!(store.resolve_customer("cus_123").unwrap(), Some(account_id));
    }

    #[test]
    fn list_entries_pagination_newest_first() {
        let (store, _dir) = create_test_store();
        let account_id = create_account(&store, 0, 0);

        for i in 1..=3 {
            store
                .add_credits(
                    &account_id,
                    i * 10,
                    CreditType::Permanent,
                    EntryReason::Purchase,
                    serde_json::Value::Null,
                )
                .unwrap();
            // ULIDs are generated at entry creation; spacing keeps them ordered.
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let all = store.list_entries_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].delta, 30); // Newest first
        assert_eq!(all[2].delta, 10);

        let page = store.list_entries_by_account(&account_id, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].delta, 20);
    }
}
