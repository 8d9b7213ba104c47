use log::{debug, warn};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::config::AiConfig;
use crate::error::{PipeSightError, Result};

const MAX_TOKENS: u32 = 4000;
const TOP_P: f32 = 0.95;
const MAX_RETRY_AFTER_SECONDS: f64 = 60.0;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an Azure OpenAI style deployment.
///
/// Covers stateless chat completions and, when an assistant id is configured,
/// the thread/run protocol of persistent assistants (see `assistant.rs`).
pub struct AiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
    assistant_id: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
    pub(super) poll_interval: Duration,
    pub(super) max_polls: u32,
}

impl AiClient {
    /// # Errors
    ///
    /// Returns a configuration error if a required setting is missing or the
    /// HTTP client cannot be built.
    pub fn new(config: &AiConfig) -> Result<Self> {
        let missing = config.missing_settings();
        if !missing.is_empty() {
            return Err(PipeSightError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("PipeSight/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipeSightError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config
                .endpoint
                .as_deref()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            deployment: config.deployment.clone().unwrap_or_default(),
            api_version: config.api_version.clone(),
            assistant_id: config
                .assistant_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
        })
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant_id.as_deref()
    }

    /// Builds `{endpoint}/openai/{path}?api-version=...`.
    pub(super) fn api_url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/openai/{}", self.endpoint, path))
            .map_err(|e| PipeSightError::Config(format!("Invalid endpoint URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    pub(super) fn get(&self, url: &Url) -> RequestBuilder {
        self.client
            .get(url.clone())
            .header("api-key", &self.api_key)
    }

    pub(super) fn post(&self, url: &Url, body: &serde_json::Value) -> RequestBuilder {
        self.client
            .post(url.clone())
            .header("api-key", &self.api_key)
            .json(body)
    }

    /// Sends a chat completion and returns the first choice's content.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint keeps returning 429/5xx past the retry budget,
    /// returns another error status, or answers without any choices.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String> {
        let url = self.api_url(&format!("deployments/{}/chat/completions", self.deployment))?;
        let body = json!({
            "messages": messages,
            "temperature": temperature,
            "max_tokens": MAX_TOKENS,
            "top_p": TOP_P,
            "frequency_penalty": 0,
            "presence_penalty": 0,
        });

        debug!("Requesting chat completion from deployment {}", self.deployment);

        let response = self.send_with_retry(|| self.post(&url, &body)).await?;
        let completion: ChatCompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(PipeSightError::NoResponseData)
    }

    /// Sends a request, retrying network failures, rate limits and server
    /// errors with linear backoff. Returns only successful responses.
    pub(super) async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retry_count = 0;
        loop {
            let response = match build().send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    if retry_count >= self.max_retries {
                        return Err(e.into());
                    }
                    let delay = self.backoff(retry_count);
                    warn!(
                        "Network error ({}), retrying in {:?} ({}/{})...",
                        e,
                        delay,
                        retry_count + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(PipeSightError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: self.max_retries,
                    });
                }

                let delay = retry_after(&response).unwrap_or_else(|| self.backoff(retry_count));
                warn!(
                    "Completion API error (status {status}). Waiting {delay:?} before retry {}/{}...",
                    retry_count + 1,
                    self.max_retries
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(PipeSightError::Api {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            return Ok(response);
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.retry_delay.saturating_mul(retry_count.saturating_add(1))
    }
}

/// Delay requested by a `retry-after` header given in seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs.min(MAX_RETRY_AFTER_SECONDS)))
}
