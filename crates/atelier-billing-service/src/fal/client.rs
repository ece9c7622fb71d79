//! Generation provider API client.

use reqwest::Client;
use std::time::Duration;

use super::types::{GenerationRequest, GenerationResult, RawResponse};

/// Error type for generation provider operations.
#[derive(Debug, thiserror::Error)]
pub enum FalError {
    /// HTTP request failed (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success status.
    #[error("provider error: HTTP {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Provider answered successfully but returned no images.
    #[error("provider returned no images")]
    NoImages,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Generation provider client.
///
/// The base URL is injectable so integration tests can point the client at a
/// mock server.
#[derive(Debug, Clone)]
pub struct FalClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FalClient {
    /// Create a new generation client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Provider endpoint for the text-to-image model
    /// * `api_key` - Provider API key; sent as `Authorization: Key <key>`
    /// * `timeout` - Per-call timeout; an elapsed timeout is an error
    ///   outcome for the caller, never a partial charge
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FalError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FalError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Run a text-to-image generation.
    ///
    /// The provider's heterogeneous response shapes are normalized into a
    /// [`GenerationResult`] here; callers never see the raw payload.
    ///
    /// # Errors
    ///
    /// - `FalError::Http` on transport failures and timeouts.
    /// - `FalError::Api` when the provider rejects the request.
    /// - `FalError::NoImages` when a successful response carries no images.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, FalError> {
        let mut builder = self.client.post(&self.base_url).json(request);

        if let Some(key) = &self.api_key {
            builder = builder.header("authorization", format!("Key {key}"));
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(FalError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: RawResponse = response.json().await?;
        let (images, description, seed) = raw.into_images();

        if images.is_empty() {
            return Err(FalError::NoImages);
        }

        Ok(GenerationResult {
            images,
            description,
            seed,
        })
    }
}
