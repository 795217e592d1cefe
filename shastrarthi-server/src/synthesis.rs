//! Cross-text synthesis: request validation and the answer stream
//!
//! The HTTP transport authenticates the caller, validates the body with
//! [`SynthesisRequest::from_body`], consults the rate limiter and checks the
//! provider before any byte of the stream is written. Everything after that
//! happens inside [`synthesis_stream`]:
//!
//! 1. resolve the `synthesis` prompt
//! 2. call the provider once
//! 3. emit one content frame per chunk, pausing between chunks
//! 4. emit `[DONE]`
//!
//! A failure in 1 or 2 produces a single error frame and no `[DONE]`.

use crate::metrics::Metrics;
use crate::provider::{CompletionProvider, ProviderError, sanitize_for_prompt};
use crate::types::{StreamEvent, SynthesizeBody, TextSummary};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;

pub const MAX_QUERY_CHARS: usize = 2000;
pub const MAX_TEXTS: usize = 8;
pub const MAX_TITLE_CHARS: usize = 300;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

pub const SYNTHESIS_PROMPT: &str = "synthesis";
const MISSING_DESCRIPTION: &str = "No summary available.";
const GENERIC_FAILURE: &str = "Failed to generate synthesis response";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing query")]
    MissingQuery,

    #[error("Query is too long. Maximum {max} characters allowed.")]
    QueryTooLong { max: usize },
}

/// A validated synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// The query as sent; sanitized later when the prompt is built
    pub query: String,
    /// Numbered lines describing the candidate texts
    pub context: String,
}

impl SynthesisRequest {
    pub fn from_body(body: SynthesizeBody) -> Result<Self, ValidationError> {
        let query = body
            .query
            .filter(|query| !is_blank(query))
            .ok_or(ValidationError::MissingQuery)?;

        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(ValidationError::QueryTooLong {
                max: MAX_QUERY_CHARS,
            });
        }

        Ok(Self {
            query,
            context: build_context(body.texts.as_deref().unwrap_or_default()),
        })
    }
}

/// True when nothing would be left of `query` once it is sanitized
///
/// A byte order mark counts as whitespace here.
fn is_blank(query: &str) -> bool {
    sanitize_for_prompt(query)
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .is_empty()
}

/// Fold candidate texts into `"{n}. {title}: {description}"` lines
///
/// Keeps the first [`MAX_TEXTS`] entries and clips long titles and
/// descriptions.
pub fn build_context(texts: &[TextSummary]) -> String {
    texts
        .iter()
        .take(MAX_TEXTS)
        .enumerate()
        .map(|(i, text)| {
            let title = clip(text.title_en.as_deref().unwrap_or_default(), MAX_TITLE_CHARS);
            let description = text
                .description
                .as_deref()
                .map(|description| clip(description, MAX_DESCRIPTION_CHARS))
                .unwrap_or(MISSING_DESCRIPTION);
            format!("{}. {}: {}", i + 1, title, description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clip(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// One frame of the answer stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Event(StreamEvent),
    Done,
}

/// Run the provider call and turn its answer into stream frames
///
/// Dropping the stream cancels the in-flight provider call.
pub fn synthesis_stream(
    provider: Arc<dyn CompletionProvider>,
    request: SynthesisRequest,
    chunk_delay: Duration,
    metrics: Arc<Metrics>,
) -> impl Stream<Item = StreamFrame> + Send {
    async_stream::stream! {
        metrics.stream_opened();
        let mut guard = StreamGuard { metrics: &metrics, completed: false };

        match generate(provider.as_ref(), &request).await {
            Ok(chunks) => {
                for chunk in chunks {
                    guard.metrics.record_chunk();
                    yield StreamFrame::Event(StreamEvent::Content(chunk));
                    if !chunk_delay.is_zero() {
                        tokio::time::sleep(chunk_delay).await;
                    }
                }
                guard.completed = true;
                yield StreamFrame::Done;
            }
            Err(err) => {
                yield StreamFrame::Event(StreamEvent::Error(failure_message(&err)));
            }
        }
    }
}

async fn generate(
    provider: &dyn CompletionProvider,
    request: &SynthesisRequest,
) -> anyhow::Result<Vec<String>> {
    let prompt = provider.resolve_prompt(SYNTHESIS_PROMPT)?;
    provider
        .generate_synthesis(&request.query, &request.context, &prompt)
        .await
}

/// Message for the error frame
///
/// User-facing provider errors carry a message meant for users; anything else
/// is hidden behind a generic one.
fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ProviderError>() {
        Some(provider_err) if provider_err.is_user_facing() => {
            tracing::warn!("Synthesis provider error: {:?}", provider_err);
            provider_err.to_string()
        }
        _ => {
            tracing::error!("Synthesis failed: {:#}", err);
            GENERIC_FAILURE.to_string()
        }
    }
}

/// Settles stream metrics however the stream ends, including client disconnect
struct StreamGuard<'a> {
    metrics: &'a Metrics,
    completed: bool,
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        self.metrics.stream_finished(self.completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::provider::{GeminiProvider, PromptConfig, PromptRegistry};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    enum Reply {
        Chunks(Vec<&'static str>),
        ProviderFailure(ProviderError),
        Other(&'static str),
    }

    struct ScriptedProvider {
        reply: Mutex<Option<Reply>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedProvider {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn is_configured(&self) -> bool {
            true
        }

        fn resolve_prompt(&self, name: &str) -> Result<PromptConfig, ProviderError> {
            PromptRegistry::builtin().resolve(name)
        }

        async fn generate_synthesis(
            &self,
            query: &str,
            context: &str,
            prompt: &PromptConfig,
        ) -> anyhow::Result<Vec<String>> {
            assert_eq!(prompt.id, SYNTHESIS_PROMPT);
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), context.to_string()));
            match self.reply.lock().unwrap().take() {
                Some(Reply::Chunks(chunks)) => Ok(chunks.into_iter().map(String::from).collect()),
                Some(Reply::ProviderFailure(err)) => Err(err.into()),
                Some(Reply::Other(message)) => Err(anyhow::anyhow!(message)),
                None => panic!("provider called twice"),
            }
        }
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest {
            query: "What is dharma?".to_string(),
            context: "1. Gita: Dialogue".to_string(),
        }
    }

    async fn collect(provider: Arc<ScriptedProvider>, metrics: Arc<Metrics>) -> Vec<StreamFrame> {
        synthesis_stream(provider, request(), Duration::ZERO, metrics)
            .collect()
            .await
    }

    fn content(text: &str) -> StreamFrame {
        StreamFrame::Event(StreamEvent::Content(text.to_string()))
    }

    fn error(text: &str) -> StreamFrame {
        StreamFrame::Event(StreamEvent::Error(text.to_string()))
    }

    #[test]
    fn test_missing_or_blank_query() {
        let missing = SynthesizeBody::default();
        assert_eq!(
            SynthesisRequest::from_body(missing),
            Err(ValidationError::MissingQuery)
        );

        let blank = SynthesizeBody {
            query: Some("  \n ".to_string()),
            texts: None,
        };
        assert_eq!(
            SynthesisRequest::from_body(blank).unwrap_err().to_string(),
            "Missing query"
        );
    }

    #[test]
    fn test_invisible_query_is_blank() {
        for query in ["\u{feff}", " \u{feff}\n", "\u{1}\u{2}\0", "\u{7f}\u{feff}"] {
            let body = SynthesizeBody {
                query: Some(query.to_string()),
                texts: None,
            };
            assert_eq!(
                SynthesisRequest::from_body(body),
                Err(ValidationError::MissingQuery),
                "{query:?}"
            );
        }

        let body = SynthesizeBody {
            query: Some("\u{feff}dharma".to_string()),
            texts: None,
        };
        assert!(SynthesisRequest::from_body(body).is_ok());
    }

    #[test]
    fn test_query_length_boundary() {
        let at_limit = SynthesizeBody {
            query: Some("q".repeat(MAX_QUERY_CHARS)),
            texts: None,
        };
        let request = SynthesisRequest::from_body(at_limit).unwrap();
        assert_eq!(request.context, "");

        let over = SynthesizeBody {
            query: Some("q".repeat(MAX_QUERY_CHARS + 1)),
            texts: None,
        };
        assert_eq!(
            SynthesisRequest::from_body(over).unwrap_err().to_string(),
            "Query is too long. Maximum 2000 characters allowed."
        );
    }

    #[test]
    fn test_query_length_counts_characters() {
        // 2000 Devanagari characters are 6000 bytes
        let body = SynthesizeBody {
            query: Some("ध".repeat(MAX_QUERY_CHARS)),
            texts: None,
        };
        assert!(SynthesisRequest::from_body(body).is_ok());
    }

    #[test]
    fn test_build_context() {
        let texts = vec![
            TextSummary {
                title_en: Some("Bhagavad Gita".to_string()),
                description: Some("Dialogue on duty".to_string()),
            },
            TextSummary {
                title_en: Some("Isha Upanishad".to_string()),
                description: None,
            },
        ];
        assert_eq!(
            build_context(&texts),
            "1. Bhagavad Gita: Dialogue on duty\n2. Isha Upanishad: No summary available."
        );
    }

    #[test]
    fn test_build_context_limits() {
        let texts: Vec<TextSummary> = (0..12)
            .map(|i| TextSummary {
                title_en: Some(format!("{}{}", i, "t".repeat(400))),
                description: Some("d".repeat(6000)),
            })
            .collect();

        let context = build_context(&texts);
        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(lines.len(), MAX_TEXTS);

        let (prefix, rest) = lines[0].split_once(". ").unwrap();
        assert_eq!(prefix, "1");
        let (title, description) = rest.split_once(": ").unwrap();
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(lines[7].starts_with("8. 7"));
    }

    #[tokio::test]
    async fn test_stream_emits_chunks_then_done() {
        let provider = ScriptedProvider::new(Reply::Chunks(vec!["A", "B", "C"]));
        let metrics = Arc::new(Metrics::new());

        let frames = collect(provider.clone(), metrics.clone()).await;

        assert_eq!(
            frames,
            vec![content("A"), content("B"), content("C"), StreamFrame::Done]
        );
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec![("What is dharma?".to_string(), "1. Gita: Dialogue".to_string())]
        );
        assert_eq!(metrics.chunks_sent.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.streams_completed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.active_streams.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_empty_answer_is_just_done() {
        let provider = ScriptedProvider::new(Reply::Chunks(vec![]));
        let frames = collect(provider, Arc::new(Metrics::new())).await;
        assert_eq!(frames, vec![StreamFrame::Done]);
    }

    #[tokio::test]
    async fn test_provider_error_message_is_forwarded() {
        let provider = ScriptedProvider::new(Reply::ProviderFailure(ProviderError::Api {
            status: 429,
            message: "Quota exceeded".to_string(),
        }));
        let metrics = Arc::new(Metrics::new());

        let frames = collect(provider, metrics.clone()).await;

        assert_eq!(frames, vec![error("Quota exceeded")]);
        assert_eq!(metrics.streams_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.chunks_sent.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_other_errors_are_generic() {
        let provider = ScriptedProvider::new(Reply::Other("connection pool poisoned"));
        let frames = collect(provider, Arc::new(Metrics::new())).await;
        assert_eq!(frames, vec![error("Failed to generate synthesis response")]);
    }

    #[tokio::test]
    async fn test_unreadable_answer_is_generic() {
        let provider = ScriptedProvider::new(Reply::ProviderFailure(
            ProviderError::InvalidResponse("expected value at line 1 column 1".to_string()),
        ));
        let metrics = Arc::new(Metrics::new());

        let frames = collect(provider, metrics.clone()).await;

        assert_eq!(frames, vec![error("Failed to generate synthesis response")]);
        assert_eq!(metrics.streams_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_unreachable_gemini_is_generic() {
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);

        let config = ProviderConfig {
            api_key: Some("key".to_string()),
            base_url: format!("http://{addr}/v1beta"),
            model: "gemini-test".to_string(),
            timeout_secs: 5,
            chunk_chars: 1,
            prompts_file: None,
        };
        let provider = GeminiProvider::new(&config, PromptRegistry::builtin()).unwrap();

        let frames: Vec<StreamFrame> = synthesis_stream(
            Arc::new(provider),
            request(),
            Duration::ZERO,
            Arc::new(Metrics::new()),
        )
        .collect()
        .await;

        assert_eq!(frames, vec![error("Failed to generate synthesis response")]);
    }

    #[tokio::test]
    async fn test_dropped_stream_settles_metrics() {
        let provider = ScriptedProvider::new(Reply::Chunks(vec!["A", "B"]));
        let metrics = Arc::new(Metrics::new());

        let mut stream = Box::pin(synthesis_stream(
            provider,
            request(),
            Duration::ZERO,
            metrics.clone(),
        ));
        assert_eq!(stream.next().await, Some(content("A")));
        drop(stream);

        assert_eq!(metrics.active_streams.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.streams_failed.load(Ordering::Relaxed), 1);
    }
}
