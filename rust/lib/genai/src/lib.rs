//! Text-generation collaborator. The service talks to it through the
//! [`TextGenerator`] trait so pipelines can degrade to deterministic
//! fallbacks when the live model is unavailable.

pub mod client;
pub mod error;
pub mod fixture;
pub mod gemini;

pub use client::{GenerationRequest, TextGenerator, TextStream};
pub use error::GenerationError;
pub use gemini::GeminiClient;
