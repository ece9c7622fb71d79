//! Generation provider integration (fal.ai).
//!
//! The provider's responses are loosely shaped; this module normalizes them
//! into one canonical result type at the boundary so the rest of the service
//! never branches on optional shapes.

pub mod client;
pub mod types;

pub use client::{FalClient, FalError};
pub use types::{AspectRatio, GeneratedImage, GenerationRequest, GenerationResult, OutputFormat};
