//! Trivial generator implementations for tests and for running without
//! a configured model.

use crate::client::{GenerationRequest, TextGenerator, TextStream};
use crate::error::GenerationError;

/// Returns fixed text, streamed word by word.
pub struct StaticGenerator {
    text: String,
}

impl StaticGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait::async_trait]
impl TextGenerator for StaticGenerator {
    async fn generate(&self, _req: GenerationRequest) -> Result<String, GenerationError> {
        Ok(self.text.clone())
    }

    async fn generate_stream(&self, _req: GenerationRequest) -> Result<TextStream, GenerationError> {
        let chunks: Vec<Result<String, GenerationError>> = self
            .text
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Fails every call with the given error constructor.
pub struct FailingGenerator;

#[async_trait::async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _req: GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Api { status: 503, message: "model unavailable".into() })
    }

    async fn generate_stream(&self, _req: GenerationRequest) -> Result<TextStream, GenerationError> {
        Err(GenerationError::Api { status: 503, message: "model unavailable".into() })
    }
}

/// Quiet stand-in when generation is disabled by configuration.
/// Pipelines treat [`GenerationError::NotConfigured`] as "use fallback"
/// without logging an upstream failure.
pub struct NullGenerator;

#[async_trait::async_trait]
impl TextGenerator for NullGenerator {
    async fn generate(&self, _req: GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured("generation disabled".into()))
    }

    async fn generate_stream(&self, _req: GenerationRequest) -> Result<TextStream, GenerationError> {
        Err(GenerationError::NotConfigured("generation disabled".into()))
    }
}
