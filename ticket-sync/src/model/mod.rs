//! Generative model access.
//!
//! Tickets in layouts without a dedicated parser are handed to a model
//! together with an extraction prompt. The [`ModelBackend`] trait is the
//! seam; [`GeminiClient`] is the production implementation.

mod client;
mod error;
mod types;

pub use client::{GeminiClient, GeminiConfig, ModelBackend};
pub use error::ModelError;
