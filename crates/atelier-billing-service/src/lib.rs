//! Atelier Billing HTTP API Service.
//!
//! This crate provides the HTTP API for the Atelier billing service,
//! including:
//!
//! - Account registration and credit balances
//! - The ledger history API
//! - Paid image generations (charge only on verified success)
//! - Payment-processor webhooks (verified, idempotent, always acknowledged)
//!
//! # Authentication
//!
//! User authentication lives outside this service. Callers are trusted
//! request handlers that present the shared service API key.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for routing consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fal;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use fal::{FalClient, FalError};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
