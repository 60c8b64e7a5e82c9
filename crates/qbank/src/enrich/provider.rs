//! Remote LLM provider backends.
//!
//! Both vendors are driven through the same [`ModelProvider`] capability:
//! one prompt in, one raw text reply out. Everything vendor-specific
//! (endpoint, headers, request/response envelope) stays inside the
//! concrete implementation chosen at construction time.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::{truncate_raw_response, EnrichError, Result};

/// Default connect timeout for provider requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for provider requests (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const OPENAI_DEFAULT_MODEL: &str = "gpt-4";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-opus-20240229";

const SYSTEM_PROMPT: &str =
    "You are an expert in educational assessment and metadata generation.";

/// Which backend the enrichment client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    fn env_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => OPENAI_DEFAULT_MODEL,
            ProviderKind::Anthropic => ANTHROPIC_DEFAULT_MODEL,
        }
    }
}

/// A remote model callable with a single prompt.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Sends the prompt and returns the raw text of the model reply.
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &'static str;
}

/// Builds a provider for `kind`, resolving the API key from the
/// environment (`OPENAI_API_KEY` / `ANTHROPIC_API_KEY`).
pub fn provider_from_env(
    kind: ProviderKind,
    model: Option<&str>,
    timeout: Duration,
) -> Result<Box<dyn ModelProvider>> {
    let api_key = std::env::var(kind.env_var()).map_err(|_| {
        EnrichError::Authentication(format!(
            "{} not found in environment variables",
            kind.env_var()
        ))
    })?;

    let model = model.unwrap_or_else(|| kind.default_model()).to_string();

    let provider: Box<dyn ModelProvider> = match kind {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(api_key, model, timeout)?),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(api_key, model, timeout)?),
    };

    Ok(provider)
}

fn create_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| EnrichError::Connection(format!("Failed to create HTTP client: {}", e)))
}

/// Maps a transport-level reqwest failure onto the taxonomy.
fn classify_transport_error(provider: &str, e: reqwest::Error) -> EnrichError {
    if e.is_timeout() {
        EnrichError::Timeout(format!("{} request timed out: {}", provider, e))
    } else if e.is_connect() {
        EnrichError::Connection(format!("Failed to connect to {}: {}", provider, e))
    } else {
        EnrichError::Connection(format!("{} request failed: {}", provider, e))
    }
}

/// Classifies a non-success status + error payload.
///
/// Providers do not reliably return structured error codes, so this
/// inspects the lower-cased payload for credential and model hints before
/// falling back to a generic API error.
fn classify_api_error(provider: &str, status: u16, payload: String) -> EnrichError {
    let lowered = payload.to_lowercase();

    let auth_hints = [
        "api key",
        "api-key",
        "api_key",
        "authentication",
        "unauthorized",
        "credential",
    ];
    if status == 401 || status == 403 || auth_hints.iter().any(|hint| lowered.contains(hint)) {
        return EnrichError::Authentication(format!("{} rejected the request: {}", provider, payload));
    }

    if lowered.contains("model")
        && (lowered.contains("not found")
            || lowered.contains("does not exist")
            || lowered.contains("invalid"))
    {
        return EnrichError::Model(format!("{} rejected the model: {}", provider, payload));
    }

    EnrichError::RemoteApi { status, payload }
}

/// Rejects replies that are not the provider's JSON protocol before any
/// parsing is attempted (proxies and gateways love HTML error pages).
fn ensure_json_content_type(provider: &str, response: &reqwest::Response) -> Result<()> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.contains("application/json") {
        Ok(())
    } else {
        Err(EnrichError::Protocol(format!(
            "{} returned unexpected content type '{}'",
            provider, content_type
        )))
    }
}

async fn read_error_payload(response: reqwest::Response) -> String {
    let payload = response.text().await.unwrap_or_default();
    truncate_raw_response(&payload)
}

/// OpenAI chat completions backend.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_http_client(timeout)?,
            api_key,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL. Used by tests against a local server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("Calling OpenAI model '{}'", self.model);

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.3
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            let payload = read_error_payload(response).await;
            warn!("OpenAI call failed ({}): {}", status, payload);
            return Err(classify_api_error(self.name(), status.as_u16(), payload));
        }

        ensure_json_content_type(self.name(), &response)?;

        let result: serde_json::Value = response.json().await.map_err(|e| {
            EnrichError::Protocol(format!("Failed to decode OpenAI response body: {}", e))
        })?;

        result["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                EnrichError::Protocol(
                    "OpenAI response missing choices[0].message.content".to_string(),
                )
            })
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }
}

/// Anthropic messages backend.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_http_client(timeout)?,
            api_key,
            model,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL. Used by tests against a local server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("Calling Anthropic model '{}'", self.model);

        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "temperature": 0.3,
            "system": SYSTEM_PROMPT,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            let payload = read_error_payload(response).await;
            warn!("Anthropic call failed ({}): {}", status, payload);
            return Err(classify_api_error(self.name(), status.as_u16(), payload));
        }

        ensure_json_content_type(self.name(), &response)?;

        let result: serde_json::Value = response.json().await.map_err(|e| {
            EnrichError::Protocol(format!("Failed to decode Anthropic response body: {}", e))
        })?;

        result["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                EnrichError::Protocol("Anthropic response missing content[0].text".to_string())
            })
    }

    fn name(&self) -> &'static str {
        "Anthropic"
    }
}
