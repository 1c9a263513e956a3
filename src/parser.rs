//! Client for the external sentence parser.
//!
//! `GET <parser_url>?speech=<text>` answers with
//! `{ "pre_process_string": ..., "isl_text_string": ..., "error"?: ... }`.

use crate::error::{IslError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wire format of the parser response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResponse {
    #[serde(default)]
    pub pre_process_string: String,
    #[serde(default)]
    pub isl_text_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A successfully parsed sentence. `pre_processed` may be empty (nothing to sign).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSentence {
    pub pre_processed: String,
    pub isl_text: String,
}

impl TryFrom<ParseResponse> for ParsedSentence {
    type Error = IslError;

    fn try_from(response: ParseResponse) -> Result<Self> {
        if let Some(message) = response.error {
            return Err(IslError::ParserRejected { message });
        }
        Ok(Self {
            pre_processed: response.pre_process_string,
            isl_text: response.isl_text_string,
        })
    }
}

/// Turns raw English into the pre-processed sentence and its gloss.
#[async_trait]
pub trait SentenceParser: Send + Sync {
    async fn parse(&self, speech: &str) -> Result<ParsedSentence>;
}

/// Parser service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpParser {
    client: reqwest::Client,
    url: String,
}

impl HttpParser {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IslError::Other(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SentenceParser for HttpParser {
    async fn parse(&self, speech: &str) -> Result<ParsedSentence> {
        let url = reqwest::Url::parse_with_params(&self.url, &[("speech", speech)]).map_err(
            |e| IslError::ConfigInvalidValue {
                key: "service.parser_url".to_string(),
                message: e.to_string(),
            },
        )?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IslError::ParserRequest {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(IslError::ParserRequest {
                message: format!("parser returned status {}", response.status()),
            });
        }

        let text = response.text().await.map_err(|e| IslError::ParserRequest {
            message: format!("failed to read parser response: {e}"),
        })?;
        if text.trim().is_empty() {
            return Err(IslError::ParserRequest {
                message: "empty response from parser".to_string(),
            });
        }

        let parsed: ParseResponse =
            serde_json::from_str(&text).map_err(|e| IslError::ParserRequest {
                message: format!("invalid parser response: {e}"),
            })?;

        tracing::info!(
            original = speech,
            isl = %parsed.isl_text_string,
            pre_processed = %parsed.pre_process_string,
            "parsed sentence"
        );
        parsed.try_into()
    }
}

/// Treats input as already pre-processed; the gloss is the uppercased text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughParser;

#[async_trait]
impl SentenceParser for PassthroughParser {
    async fn parse(&self, speech: &str) -> Result<ParsedSentence> {
        Ok(ParsedSentence {
            pre_processed: speech.trim().to_string(),
            isl_text: speech.trim().to_uppercase(),
        })
    }
}

/// Canned parser for tests and offline runs.
///
/// Unknown sentences parse to themselves (lowercased), so the resolver sees
/// the typed text directly.
#[derive(Debug, Clone, Default)]
pub struct MockParser {
    responses: Arc<Mutex<HashMap<String, MockReply>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug, Clone)]
enum MockReply {
    Parsed(ParsedSentence),
    Fail(String),
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, speech: &str, pre_processed: &str, isl_text: &str) -> Self {
        self.insert(
            speech,
            MockReply::Parsed(ParsedSentence {
                pre_processed: pre_processed.to_string(),
                isl_text: isl_text.to_string(),
            }),
        );
        self
    }

    pub fn with_failure(self, speech: &str, message: &str) -> Self {
        self.insert(speech, MockReply::Fail(message.to_string()));
        self
    }

    /// Delay the reply for `speech`.
    pub fn with_delay(self, speech: &str, delay: Duration) -> Self {
        match self.delays.lock() {
            Ok(mut delays) => delays.insert(speech.to_string(), delay),
            Err(poisoned) => poisoned.into_inner().insert(speech.to_string(), delay),
        };
        self
    }

    /// Sentences passed to `parse`, in call order.
    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn insert(&self, speech: &str, reply: MockReply) {
        match self.responses.lock() {
            Ok(mut responses) => responses.insert(speech.to_string(), reply),
            Err(poisoned) => poisoned.into_inner().insert(speech.to_string(), reply),
        };
    }
}

#[async_trait]
impl SentenceParser for MockParser {
    async fn parse(&self, speech: &str) -> Result<ParsedSentence> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(speech.to_string()),
            Err(poisoned) => poisoned.into_inner().push(speech.to_string()),
        }

        let delay = match self.delays.lock() {
            Ok(delays) => delays.get(speech).copied(),
            Err(poisoned) => poisoned.into_inner().get(speech).copied(),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = match self.responses.lock() {
            Ok(responses) => responses.get(speech).cloned(),
            Err(poisoned) => poisoned.into_inner().get(speech).cloned(),
        };
        match reply {
            Some(MockReply::Parsed(parsed)) => Ok(parsed),
            Some(MockReply::Fail(message)) => Err(IslError::ParserRequest { message }),
            None => Ok(ParsedSentence {
                pre_processed: speech.to_lowercase(),
                isl_text: speech.to_uppercase(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn parser_for(server: &MockServer) -> HttpParser {
        HttpParser::new(format!("{}/parser", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn parses_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/parser"))
            .and(query_param("speech", "hello world."))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pre_process_string": "hello world.",
                "isl_text_string": "HELLO WORLD"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let parsed = parser_for(&server).await.parse("hello world.").await.unwrap();
        assert_eq!(parsed.pre_processed, "hello world.");
        assert_eq!(parsed.isl_text, "HELLO WORLD");
    }

    #[tokio::test]
    async fn error_field_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/parser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "Java is not installed"
            })))
            .mount(&server)
            .await;

        let err = parser_for(&server).await.parse("hi").await.unwrap_err();
        assert!(matches!(err, IslError::ParserRejected { ref message } if message == "Java is not installed"));
    }

    #[tokio::test]
    async fn non_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = parser_for(&server).await.parse("hi").await.unwrap_err();
        assert!(matches!(err, IslError::ParserRequest { .. }));
    }

    #[tokio::test]
    async fn empty_and_malformed_bodies_are_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("speech", "empty"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  "))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("speech", "broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let parser = parser_for(&server).await;
        assert!(matches!(
            parser.parse("empty").await,
            Err(IslError::ParserRequest { .. })
        ));
        assert!(matches!(
            parser.parse("broken").await,
            Err(IslError::ParserRequest { .. })
        ));
    }

    #[tokio::test]
    async fn empty_pre_processed_string_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pre_process_string": "",
                "isl_text_string": ""
            })))
            .mount(&server)
            .await;

        let parsed = parser_for(&server).await.parse("uh").await.unwrap();
        assert!(parsed.pre_processed.is_empty());
    }

    #[tokio::test]
    async fn unreachable_parser_is_request_failure() {
        let parser =
            HttpParser::new("http://127.0.0.1:9/parser", Duration::from_millis(500)).unwrap();
        let err = parser.parse("hi").await.unwrap_err();
        assert!(matches!(err, IslError::ParserRequest { .. }));
    }

    #[tokio::test]
    async fn passthrough_keeps_sentence() {
        let parsed = PassthroughParser.parse(" Hello world. ").await.unwrap();
        assert_eq!(parsed.pre_processed, "Hello world.");
        assert_eq!(parsed.isl_text, "HELLO WORLD.");
    }

    #[tokio::test]
    async fn mock_parser_echoes_unknown_sentences() {
        let parser = MockParser::new().with_failure("bad", "boom");
        let parsed = parser.parse("Hello There").await.unwrap();
        assert_eq!(parsed.pre_processed, "hello there");
        assert!(parser.parse("bad").await.is_err());
        assert_eq!(parser.calls(), vec!["Hello There", "bad"]);
    }
}
