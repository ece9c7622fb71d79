//! Account management handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use atelier_billing_core::{Account, AccountId};
use atelier_billing_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub account_id: String,
    /// Permanent credits.
    pub permanent_credits: i64,
    /// Subscription credits.
    pub subscription_credits: i64,
    /// Total credits.
    pub total_credits: i64,
    /// Subscription status.
    pub subscription_status: String,
    /// Subscription plan, if any.
    pub subscription_plan: Option<String>,
    /// Subscription period end, if any.
    pub subscription_end: Option<String>,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id.to_string(),
            permanent_credits: account.permanent_credits,
            subscription_credits: account.subscription_credits,
            total_credits: account.total_credits(),
            subscription_status: format!("{:?}", account.subscription_status).to_lowercase(),
            subscription_plan: account.subscription_plan.clone(),
            subscription_end: account.subscription_end.map(|d| d.to_rfc3339()),
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Create account request.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Account ID minted by the identity layer at signup.
    pub account_id: String,
}

/// Register a new billing account.
///
/// Called by the signup flow; account ids are minted upstream.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id: AccountId = body
        .account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    if state.store.get_account(&account_id)?.is_some() {
        return Err(ApiError::Conflict("Account already exists".into()));
    }

    let account = Account::new(account_id);
    state.store.put_account(&account)?;

    tracing::info!(account_id = %account_id, "Account created");

    Ok(Json(AccountResponse::from(&account)))
}

/// Get an account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(account_id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id: AccountId = account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    let account = state
        .store
        .get_account(&account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    Ok(Json(AccountResponse::from(&account)))
}
