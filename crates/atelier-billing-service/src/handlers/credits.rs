//! Credit balance and ledger handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use atelier_billing_core::{AccountId, LedgerEntry};
use atelier_billing_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Permanent credits.
    pub permanent: i64,
    /// Subscription credits.
    pub subscription: i64,
    /// Total spendable credits.
    pub total: i64,
}

/// Get current credit balances. Read-only.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(account_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account_id: AccountId = account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    let balances = state.store.get_balances(&account_id)?;

    Ok(Json(BalanceResponse {
        permanent: balances.permanent,
        subscription: balances.subscription,
        total: balances.total(),
    }))
}

/// Ledger list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListLedgerQuery {
    /// Maximum number of entries to return (default: 50, capped at 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Ledger entry response.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Entry ID.
    pub id: String,
    /// Signed credit delta.
    pub delta: i64,
    /// Affected credit pool.
    pub credit_type: String,
    /// Reason code.
    pub reason: String,
    /// Total balance after this entry.
    pub balance_after: i64,
    /// Correlation metadata.
    pub metadata: serde_json::Value,
    /// Timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for EntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            delta: entry.delta,
            credit_type: format!("{:?}", entry.credit_type).to_lowercase(),
            reason: format!("{:?}", entry.reason).to_lowercase(),
            balance_after: entry.balance_after,
            metadata: entry.metadata.clone(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// List ledger response.
#[derive(Debug, Serialize)]
pub struct ListLedgerResponse {
    /// Entries (newest first).
    pub entries: Vec<EntryResponse>,
    /// Whether there are more entries.
    pub has_more: bool,
}

/// List an account's ledger history.
pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(account_id): Path<String>,
    Query(query): Query<ListLedgerQuery>,
) -> Result<Json<ListLedgerResponse>, ApiError> {
    let account_id: AccountId = account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    // Verify account exists
    state
        .store
        .get_account(&account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let entries = state
        .store
        .list_entries_by_account(&account_id, limit + 1, query.offset)?;

    let has_more = entries.len() > limit;
    let entries: Vec<_> = entries.iter().take(limit).map(EntryResponse::from).collect();

    Ok(Json(ListLedgerResponse { entries, has_more }))
}
