//! Wire types shared by the HTTP transport and the synthesis controller
//!
//! # Request
//!
//! ```json
//! {
//!   "query": "How do the Gita and the Upanishads treat detachment?",
//!   "texts": [
//!     { "title_en": "Bhagavad Gita", "description": "Dialogue on duty and devotion" },
//!     { "title_en": "Isha Upanishad", "description": null }
//!   ]
//! }
//! ```
//!
//! # Stream frames
//!
//! ```text
//! data: {"content":"T"}
//!
//! data: {"content":"h"}
//!
//! data: [DONE]
//! ```

use serde::{Deserialize, Serialize};

/// Body of `POST /api/synthesize`
///
/// `query` is optional at the type level so that a missing query is reported
/// as a validation failure rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesizeBody {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub texts: Option<Vec<TextSummary>>,
}

/// One candidate text offered as context for the synthesis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextSummary {
    #[serde(default)]
    pub title_en: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,
}

impl HttpErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Payload of one `data:` frame in the synthesis stream
///
/// Serializes to `{"content": ...}` or `{"error": ...}`. The terminal
/// `[DONE]` sentinel is not JSON and is written separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEvent {
    Content(String),
    Error(String),
}

/// Sentinel written after the last content frame of a successful stream
pub const STREAM_DONE: &str = "[DONE]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_shape() {
        let content = serde_json::to_string(&StreamEvent::Content("A".to_string())).unwrap();
        assert_eq!(content, r#"{"content":"A"}"#);

        let error = serde_json::to_string(&StreamEvent::Error("boom".to_string())).unwrap();
        assert_eq!(error, r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_body_defaults() {
        let body: SynthesizeBody = serde_json::from_str("{}").unwrap();
        assert!(body.query.is_none());
        assert!(body.texts.is_none());

        let body: SynthesizeBody = serde_json::from_str(
            r#"{"query": "dharma", "texts": [{"title_en": "Gita", "description": null}]}"#,
        )
        .unwrap();
        assert_eq!(body.query.as_deref(), Some("dharma"));
        let texts = body.texts.unwrap();
        assert_eq!(texts[0].title_en.as_deref(), Some("Gita"));
        assert!(texts[0].description.is_none());
    }
}
