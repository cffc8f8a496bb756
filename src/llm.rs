//! OpenAI-compatible chat completion client
//!
//! Fail-soft by contract: every failure path logs and returns an empty
//! string. Rate limits and 5xx answers are retried with a linear backoff,
//! transport errors with a slightly longer one.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, warn};

use crate::error::Result;
use crate::metrics::AnalysisMetrics;
use crate::reply::{ChatMessage, CompletionClient, CompletionRequest};

/// Statuses worth another attempt
const TRANSIENT_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// API base, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    /// Bearer key; without one no request is made
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts before giving up
    pub max_retries: u32,
    /// Base delay between attempts
    pub backoff_unit: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Chat completion client over reqwest
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    settings: OpenAiSettings,
    client: Client,
    metrics: AnalysisMetrics,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            settings,
            client,
            metrics: AnalysisMetrics::default(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.settings.endpoint.trim_end_matches('/'))
    }

    async fn attempt_all(&self, api_key: &str, request: &CompletionRequest) -> (String, &'static str) {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            n: 1,
        };
        let retries = self.settings.max_retries;

        for attempt in 0..retries {
            let last = attempt + 1 == retries;
            let sent = self
                .client
                .post(self.chat_url())
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;

            match sent {
                Ok(response) if response.status() == StatusCode::OK => {
                    return match response.json::<ChatResponse>().await {
                        Ok(parsed) => first_choice(parsed),
                        Err(e) => {
                            error!(error = %e, "Completion response could not be parsed");
                            (String::new(), "fatal")
                        }
                    };
                }
                Ok(response) if TRANSIENT_STATUSES.contains(&response.status()) => {
                    let status = response.status();
                    let wait = self.settings.backoff_unit * 2 * (attempt + 1);
                    let text = response.text().await.unwrap_or_default();
                    warn!(
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        retries,
                        wait_ms = wait.as_millis(),
                        body = %crate::utils::tail_chars(&text, 200),
                        "Completion transient error, retrying"
                    );
                    if !last {
                        tokio::time::sleep(wait).await;
                    }
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    error!(status = status.as_u16(), body = %text, "Completion request rejected");
                    return (String::new(), "fatal");
                }
                Err(e) => {
                    let wait = self.settings.backoff_unit * (1 + 2 * attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        retries,
                        "Completion request failed"
                    );
                    if !last {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        error!(retries, "Completion request failed after all attempts");
        (String::new(), "retry_exhausted")
    }
}

fn first_choice(response: ChatResponse) -> (String, &'static str) {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content);

    match content {
        Some(text) => (text.trim().to_string(), "success"),
        None => {
            warn!("Completion returned no choices");
            (String::new(), "empty")
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> String {
        let Some(api_key) = self
            .settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
        else {
            error!("Completion API key is not configured");
            return String::new();
        };

        let started = Instant::now();
        let (text, outcome) = self.attempt_all(api_key, request).await;
        self.metrics.record_llm_request(outcome, started.elapsed());
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_trims_slash() {
        let client = OpenAiClient::new(OpenAiSettings {
            endpoint: "http://localhost:9000/v1/".to_string(),
            ..OpenAiSettings::default()
        })
        .expect("Failed to create client");
        assert_eq!(client.chat_url(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn test_first_choice() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"  Hi \n"}}]}"#)
                .expect("valid json");
        assert_eq!(first_choice(parsed), ("Hi".to_string(), "success"));

        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("valid json");
        assert_eq!(first_choice(parsed), (String::new(), "empty"));

        let parsed: ChatResponse = serde_json::from_str("{}").expect("valid json");
        assert_eq!(first_choice(parsed).0, "");
    }

    #[tokio::test]
    async fn test_missing_key_returns_empty() {
        let client = OpenAiClient::new(OpenAiSettings::default()).expect("Failed to create client");
        let request = CompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: 10,
            temperature: 0.2,
        };
        assert_eq!(client.complete(&request).await, "");
    }
}
