//! Text-completion providers
//!
//! The synthesis controller talks to a [`CompletionProvider`]; the production
//! implementation is [`GeminiProvider`]. Tests plug in their own.

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiProvider;
pub use prompts::{PromptConfig, PromptRegistry, sanitize_for_prompt};

use async_trait::async_trait;

/// Failures a provider reports to callers
///
/// Upstream detail is kept in the variant fields for logging. Only variants
/// for which [`ProviderError::is_user_facing`] holds may be shown to end
/// users.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("AI service is not configured.")]
    NotConfigured,

    #[error("Unknown prompt config: {0}")]
    UnknownPrompt(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("The AI service took too long to respond. Please try again.")]
    Timeout,

    #[error("Failed to reach the AI service")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to generate synthesis")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether `Display` is meant for end users
    ///
    /// Unreachable upstreams and unreadable answers are reported generically.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::InvalidResponse(_))
    }
}

/// A backend that turns a query and context into text
///
/// `generate_synthesis` may fail with any error; a user-facing
/// [`ProviderError`] inside the `anyhow::Error` marks the failure as one whose
/// message can be shown.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Whether credentials are present
    fn is_configured(&self) -> bool;

    /// Look up a named prompt configuration
    fn resolve_prompt(&self, name: &str) -> Result<PromptConfig, ProviderError>;

    /// Produce the synthesis text, already split into stream chunks
    async fn generate_synthesis(
        &self,
        query: &str,
        context: &str,
        prompt: &PromptConfig,
    ) -> anyhow::Result<Vec<String>>;
}

/// Split `text` into pieces of at most `chunk_chars` characters
///
/// Splits on `char` boundaries so multi-byte scripts stay intact. A
/// `chunk_chars` of zero is treated as one.
pub fn split_into_chunks(text: &str, chunk_chars: usize) -> Vec<String> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::with_capacity(text.len() / chunk_chars + 1);
    let mut current = String::new();
    let mut count = 0;

    for c in text.chars() {
        current.push(c);
        count += 1;
        if count == chunk_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
