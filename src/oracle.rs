//! Enrichment client for the external language-model oracle.
//!
//! Wraps a [`ChatTransport`] (Ollama in production, fakes in tests) with
//! the fixed retry policy from [`crate::retry`] and exposes the two
//! operations the driver consumes per unit: sentiment classification and
//! keyword extraction. The oracle is treated as a stateless, synchronous
//! black box — one request, one JSON-object-shaped response. Its semantic
//! correctness is not our contract; an unparseable response is simply a
//! failed attempt.
//!
//! A separate raw text-generation path (`generate`) consumes a streamed
//! multi-line response and concatenates the fragments. That path exists
//! only as a liveness probe and plays no part in enrichment.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::config::OracleConfig;
use crate::retry::{with_retry, ExternalServiceError, RetryPolicy};

const POST_SENTIMENT_PROMPT: &str = "You are a helpful assistant that analyzes the sentiment of a post title. \
    You understand that the title can be nuanced, and that it can only be positive, negative, or neutral. \
    Respond with JSON in the form {\"sentiment\": \"positive\" | \"negative\" | \"neutral\"}.";

const COMMENT_SENTIMENT_PROMPT: &str = "You are a helpful assistant that analyzes the sentiment of a comment body. \
    You understand that the body can be nuanced, and that it can only be positive, negative, or neutral. \
    Use the parent body only to understand the sentiment of the comment body. \
    Respond with JSON in the form {\"sentiment\": \"positive\" | \"negative\" | \"neutral\"}.";

const KEYWORD_PROMPT: &str = "You are a helpful assistant that understands keywords in a sentence. \
    You are given a sentiment and a sentence. Respond with the keywords, taken from the sentence, \
    that explain its sentiment, as JSON in the form {\"keywords\": [\"keyword1\", \"keyword2\"]}.";

/// Raw transport beneath the enrichment operations.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One chat round trip. With `json_mode` the model is constrained to
    /// emit a JSON object.
    async fn chat(&self, system_prompt: &str, user_message: &str, json_mode: bool)
        -> Result<String>;

    /// Raw completion; the response is streamed as NDJSON fragments which
    /// are concatenated into one string. Liveness probe only.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Cheap readiness check against the service's health endpoint.
    async fn health(&self) -> Result<()>;
}

/// [`ChatTransport`] backed by a local Ollama instance.
pub struct OllamaTransport {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaTransport {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatTransport for OllamaTransport {
    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        json_mode: bool,
    ) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message },
            ],
            "options": { "temperature": 0 },
        });
        if json_mode {
            body["format"] = json!("json");
        }

        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("oracle unreachable at {}", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("oracle returned {}: {}", status, text);
        }

        let value: serde_json::Value = resp.json().await.context("oracle response is not JSON")?;
        value["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("oracle response missing message content"))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({ "model": self.model, "prompt": prompt });

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("oracle unreachable at {}", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("oracle returned {}: {}", status, text);
        }

        // One JSON object per line, each holding a response fragment.
        let text = resp.text().await?;
        let mut out = String::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let fragment: serde_json::Value =
                serde_json::from_str(line).context("unparseable generate stream line")?;
            if let Some(piece) = fragment["response"].as_str() {
                out.push_str(piece);
            }
        }
        Ok(out)
    }

    async fn health(&self) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .with_context(|| format!("oracle unreachable at {}", self.base_url))?;
        if !resp.status().is_success() {
            bail!("oracle health check returned {}", resp.status());
        }
        Ok(())
    }
}

/// Retry-governed client over any [`ChatTransport`].
pub struct OracleClient<T: ChatTransport> {
    transport: T,
    retry: RetryPolicy,
    health_attempts: u32,
    health_delay: Duration,
}

impl<T: ChatTransport> OracleClient<T> {
    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub fn new(transport: T, config: &OracleConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::from_config(config),
            health_attempts: config.health_attempts,
            health_delay: Duration::from_secs(config.health_delay_secs),
        }
    }

    /// Block until the oracle answers its health endpoint, polling up to
    /// the configured attempt count. Failure here is fatal — it is not
    /// wrapped in the per-call retry budget.
    pub async fn wait_ready(&self) -> Result<()> {
        for attempt in 1..=self.health_attempts {
            match self.transport.health().await {
                Ok(()) => {
                    debug!(attempt, "oracle ready");
                    return Ok(());
                }
                Err(e) => {
                    info!(attempt, max = self.health_attempts, error = %e, "oracle not ready");
                    if attempt < self.health_attempts {
                        tokio::time::sleep(self.health_delay).await;
                    }
                }
            }
        }
        bail!(
            "oracle not ready after {} health checks",
            self.health_attempts
        )
    }

    /// Classify `text` as positive, negative, or neutral. For comment
    /// units the parent text is passed as `context` to disambiguate tone.
    pub async fn classify_sentiment(
        &self,
        text: &str,
        context: Option<&str>,
    ) -> Result<String, ExternalServiceError> {
        let (system, user) = match context {
            Some(parent) => (
                COMMENT_SENTIMENT_PROMPT,
                format!("Comment Body: {}, Parent Body: {}", text, parent),
            ),
            None => (POST_SENTIMENT_PROMPT, text.to_string()),
        };

        let user = user.as_str();
        with_retry(&self.retry, move || async move {
            let raw = self.transport.chat(system, user, true).await?;
            parse_sentiment(&raw)
        })
        .await
    }

    /// Ask for the keywords in `text` that explain its `sentiment`. The
    /// keywords-come-from-the-text contract is the oracle's to honor;
    /// the client forwards whatever list comes back.
    pub async fn extract_keywords(
        &self,
        sentiment: &str,
        text: &str,
    ) -> Result<Vec<String>, ExternalServiceError> {
        let user = format!("Sentiment: {}, Sentence: {}", sentiment, text);

        let user = user.as_str();
        with_retry(&self.retry, move || async move {
            let raw = self.transport.chat(KEYWORD_PROMPT, user, true).await?;
            parse_keywords(&raw)
        })
        .await
    }

    /// Connectivity probe: a raw generation round trip, not retried.
    pub async fn probe(&self) -> Result<String> {
        self.transport.generate("Why is the sky blue?").await
    }
}

fn parse_sentiment(raw: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("sentiment response is not a JSON object")?;
    value["sentiment"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("sentiment response missing 'sentiment' key"))
}

fn parse_keywords(raw: &str) -> Result<Vec<String>> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("keyword response is not a JSON object")?;
    let items = value["keywords"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("keyword response missing 'keywords' array"))?;
    Ok(items
        .iter()
        .filter_map(|k| k.as_str())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` chat calls, then answers with the canned
    /// response.
    pub(crate) struct FlakyTransport {
        pub failures: u32,
        pub response: String,
        pub calls: AtomicU32,
    }

    impl FlakyTransport {
        pub fn new(failures: u32, response: &str) -> Self {
            Self {
                failures,
                response: response.to_string(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for FlakyTransport {
        async fn chat(&self, _system: &str, _user: &str, _json_mode: bool) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                bail!("simulated transport failure {}", n);
            }
            Ok(self.response.clone())
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("probe ok".to_string())
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> OracleConfig {
        OracleConfig {
            retry_delay_secs: 0,
            health_delay_secs: 0,
            ..OracleConfig::default()
        }
    }

    #[tokio::test]
    async fn test_sentiment_succeeds_on_third_attempt() {
        let transport = FlakyTransport::new(2, r#"{"sentiment": "positive"}"#);
        let client = OracleClient::new(transport, &fast_config());

        let sentiment = client.classify_sentiment("great game", None).await.unwrap();
        assert_eq!(sentiment, "positive");
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sentiment_fails_after_three_attempts() {
        let transport = FlakyTransport::new(u32::MAX, "never reached");
        let client = OracleClient::new(transport, &fast_config());

        let err = client
            .classify_sentiment("great game", None)
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unparseable_response_counts_as_failed_attempt() {
        let transport = FlakyTransport::new(0, "not json at all");
        let client = OracleClient::new(transport, &fast_config());

        let err = client.classify_sentiment("text", None).await.unwrap_err();
        assert_eq!(err.attempts, 3);
        // Every attempt got a response, every response failed to parse.
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_keywords_parsed_in_order() {
        let transport = FlakyTransport::new(0, r#"{"keywords": ["great", "game", "story"]}"#);
        let client = OracleClient::new(transport, &fast_config());

        let keywords = client
            .extract_keywords("positive", "great game with a great story")
            .await
            .unwrap();
        assert_eq!(keywords, vec!["great", "game", "story"]);
    }

    #[test]
    fn test_parse_sentiment_rejects_missing_key() {
        assert!(parse_sentiment(r#"{"mood": "positive"}"#).is_err());
        assert!(parse_sentiment("garbage").is_err());
        assert_eq!(
            parse_sentiment(r#"{"sentiment": "neutral"}"#).unwrap(),
            "neutral"
        );
    }

    #[test]
    fn test_parse_keywords_rejects_missing_array() {
        assert!(parse_keywords(r#"{"sentiment": "positive"}"#).is_err());
        assert!(parse_keywords(r#"{"keywords": ["a"]}"#).is_ok());
    }
}
