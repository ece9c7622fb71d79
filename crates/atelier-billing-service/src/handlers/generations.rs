//! Image generation handler: the paid-operation spend path.
//!
//! The ordering here is the service's core fairness guarantee: the balance
//! is pre-checked, the provider is invoked, and credits are deducted only
//! after the provider verifiably succeeded. A failed or timed-out generation
//! never charges the account.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use atelier_billing_core::{AccountId, Balances, EntryReason, GENERATION_COST_CREDITS};
use atelier_billing_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::fal::{AspectRatio, GeneratedImage, GenerationRequest, OutputFormat};
use crate::state::AppState;

/// Maximum images per generation request.
const MAX_IMAGES_PER_REQUEST: u32 = 4;

/// Characters of the prompt kept in ledger metadata.
const PROMPT_METADATA_CHARS: usize = 100;

/// Generation request body.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Account to charge.
    pub account_id: String,
    /// Text prompt.
    pub prompt: String,
    /// Number of images (default 1, capped at 4).
    #[serde(default)]
    pub num_images: Option<u32>,
    /// Output aspect ratio (default 1:1).
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    /// Output format (default jpeg).
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
}

/// Generation response body.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Generated images.
    pub images: Vec<GeneratedImage>,
    /// Model-provided description, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Credits charged for this generation.
    pub cost: i64,
    /// Balances after the charge.
    pub credits: CreditsView,
}

/// Balance view returned alongside paid operations.
#[derive(Debug, Serialize)]
pub struct CreditsView {
    /// Permanent credits remaining.
    pub permanent: i64,
    /// Subscription credits remaining.
    pub subscription: i64,
    /// Total credits remaining.
    pub total: i64,
}

impl From<Balances> for CreditsView {
    fn from(balances: Balances) -> Self {
        Self {
            permanent: balances.permanent,
            subscription: balances.subscription,
            total: balances.total(),
        }
    }
}

/// Run a text-to-image generation and charge for it on success.
pub async fn create_generation(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let account_id: AccountId = body
        .account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    let account = state
        .store
        .get_account(&account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;

    let cost = GENERATION_COST_CREDITS;

    // Pre-check before dispatching the paid call. The authoritative check
    // happens again inside deduct_credits under the account lock; this one
    // exists so an obviously broke account never reaches the provider.
    if !account.has_sufficient_credits(cost) {
        return Err(ApiError::InsufficientCredits {
            balance: account.total_credits(),
            required: cost,
        });
    }

    if body.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("Prompt must not be empty".into()));
    }

    let num_images = body.num_images.unwrap_or(1).clamp(1, MAX_IMAGES_PER_REQUEST);

    let fal = state
        .fal
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("Generation provider not configured".into()))?;

    let request = GenerationRequest {
        prompt: body.prompt.clone(),
        num_images,
        aspect_ratio: body.aspect_ratio.unwrap_or_default(),
        output_format: body.output_format.unwrap_or_default(),
    };

    tracing::debug!(
        service = %auth.service_name,
        account_id = %account_id,
        num_images = num_images,
        "Dispatching generation"
    );

    // The paid external call. Any error outcome, including a timeout, leaves
    // the balance and ledger untouched.
    let result = fal.generate(&request).await.map_err(|e| {
        tracing::warn!(
            account_id = %account_id,
            error = %e,
            "Generation failed, no credits charged"
        );
        ApiError::ExternalService(format!("Image generation failed: {e}"))
    })?;

    // Verified success: commit the debit.
    let prompt_excerpt: String = body.prompt.chars().take(PROMPT_METADATA_CHARS).collect();
    let balances = state.store.deduct_credits(
        &account_id,
        cost,
        EntryReason::Generation,
        serde_json::json!({
            "action": "text_to_image",
            "prompt": prompt_excerpt,
            "num_images": num_images,
            "images_returned": result.images.len(),
            "service": auth.service_name,
        }),
    )?;

    tracing::info!(
        account_id = %account_id,
        cost = cost,
        images = result.images.len(),
        remaining = balances.total(),
        "Generation charged"
    );

    Ok(Json(GenerateResponse {
        images: result.images,
        description: result.description,
        cost,
        credits: balances.into(),
    }))
}
