//! Embedder and Summarizer traits — the abstractions over model providers.
//!
//! The raw HTTP clients (retries, timeouts, auth) live outside this
//! subsystem; caller-supplied limits pass through untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, LlmError};

/// Generation knobs passed through to the model provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature (0.0 = deterministic).
    pub temperature: f32,

    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 256,
        }
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// The generated text.
    pub text: String,
}

/// Generates embeddings for texts.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed the given texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Generates text with an LLM. Used for long-message and cluster
/// summarization.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Run the prompt and return the completion.
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<Generation, LlmError>;
}
