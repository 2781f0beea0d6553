use std::pin::Pin;

use futures::Stream;

use crate::error::GenerationError;

/// A finite, non-restartable stream of generated text chunks.
///
/// Dropping the stream cancels upstream generation promptly; producers
/// must not buffer unconsumed output beyond their channel bound.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            system_instruction: String::new(),
            temperature: 0.3,
            max_output_tokens: 2048,
            top_p: 0.95,
            top_k: 40,
        }
    }
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Default::default() }
    }

    pub fn with_system(mut self, system_instruction: impl Into<String>) -> Self {
        self.system_instruction = system_instruction.into();
        self
    }
}

/// Pluggable text-generation collaborator.
///
/// Implementations handle transport, auth and response decoding. Callers
/// own timeout and fallback policy.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the full response text.
    async fn generate(&self, req: GenerationRequest) -> Result<String, GenerationError>;

    /// Generate the response as a chunk stream.
    async fn generate_stream(&self, req: GenerationRequest) -> Result<TextStream, GenerationError>;
}
