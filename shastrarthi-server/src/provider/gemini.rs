//! Gemini `generateContent` client

use super::prompts::{PromptConfig, PromptRegistry, sanitize_for_prompt};
use super::{CompletionProvider, ProviderError, split_into_chunks};
use crate::config::ProviderConfig;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const FALLBACK_ERROR: &str = "Failed to generate synthesis";

const OUTPUT_FORMAT: [&str; 3] = [
    "- One short overview paragraph",
    "- 3 bullet points with cross-text insights",
    "- One suggested next step for study",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Gemini-backed [`CompletionProvider`]
pub struct GeminiProvider {
    http_client: Client,
    api_key: Option<String>,
    endpoint: String,
    chunk_chars: usize,
    prompts: PromptRegistry,
}

impl GeminiProvider {
    /// Create a provider; a missing API key leaves it unconfigured
    pub fn new(config: &ProviderConfig, prompts: PromptRegistry) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            chunk_chars: config.chunk_chars,
            prompts,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn generate(
        &self,
        query: &str,
        context: &str,
        prompt: &PromptConfig,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;
        let body = synthesis_request(query, context, prompt);

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            tracing::warn!("Gemini returned {}: {}", status, text);
            return Err(api_error(status.as_u16(), &text));
        }

        parse_answer(&text)
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn resolve_prompt(&self, name: &str) -> Result<PromptConfig, ProviderError> {
        self.prompts.resolve(name)
    }

    async fn generate_synthesis(
        &self,
        query: &str,
        context: &str,
        prompt: &PromptConfig,
    ) -> Result<Vec<String>> {
        let answer = self.generate(query, context, prompt).await?;
        tracing::debug!("Gemini answer: {} chars", answer.chars().count());
        Ok(split_into_chunks(&answer, self.chunk_chars))
    }
}

/// Build the request body for a synthesis call
pub(crate) fn synthesis_request(
    query: &str,
    context: &str,
    prompt: &PromptConfig,
) -> GenerateContentRequest {
    let mut lines = vec![
        format!("User query: {}", sanitize_for_prompt(query)),
        "Candidate texts:".to_string(),
        sanitize_for_prompt(context),
        "Output format:".to_string(),
    ];
    lines.extend(OUTPUT_FORMAT.iter().map(|line| line.to_string()));

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: Some(prompt.system_instruction()),
            }],
        },
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(lines.join("\n")),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: prompt.temperature,
            max_output_tokens: prompt.max_output_tokens,
        },
    }
}

fn parse_answer(body: &str) -> Result<String, ProviderError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .unwrap_or_default())
}

fn api_error(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| FALLBACK_ERROR.to_string());

    ProviderError::Api { status, message }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        tracing::error!("Gemini request failed: {}", err);
        ProviderError::Transport(err)
    }
}
