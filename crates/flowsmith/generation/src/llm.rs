//! Model backend adapters for generation and repair.

use crate::context::ContextSnippet;
use crate::generator::FlowGenerator;
use crate::request::{generation_instructions, GenerationOutput, GenerationRequest};
use async_trait::async_trait;
use flowsmith_repair::{RepairCollaborator, RepairRequest};
use flowsmith_resilience::{classify_status, RateLimitGuard};
use flowsmith_types::{FlowsmithError, FlowsmithResult};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";

const REPAIR_INSTRUCTIONS: &str = "You fix rows of a flow document that a validator rejected. \
Return the corrected rows as comma-separated lines with the same columns and the same node \
numbers. Do not return context rows. Do not add or remove rows.";

/// Which wire protocol the backend speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI chat completions, or any compatible server
    #[default]
    #[serde(rename = "openai", alias = "open_ai", alias = "openai_compatible")]
    OpenAi,
    Anthropic,
    /// Local Ollama server
    Ollama,
}

/// Model backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: BackendKind,
    pub endpoint: Option<String>,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: Some(0.2),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Text-completion client used as both generator and repair collaborator.
///
/// Every call goes through a [`RateLimitGuard`]: a rate-limited answer is
/// returned at once and later calls fail fast until the wait has passed.
pub struct LlmClient {
    client: Client,
    config: ModelConfig,
    guard: RateLimitGuard,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> FlowsmithResult<Self> {
        if config.kind != BackendKind::Ollama && config.api_key.is_none() {
            return Err(FlowsmithError::Config(format!(
                "{:?} backend requires an api key",
                config.kind
            )));
        }
        Ok(Self {
            client: build_http_client(config.timeout)?,
            config,
            guard: RateLimitGuard::new(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// One completion.
    #[instrument(skip(self, system, prompt), fields(kind = ?self.config.kind, model = %self.config.model))]
    pub async fn complete(&self, system: &str, prompt: &str) -> FlowsmithResult<String> {
        let started = Instant::now();
        let output = self
            .guard
            .call(async {
                match self.config.kind {
                    BackendKind::OpenAi => self.complete_openai(system, prompt).await,
                    BackendKind::Anthropic => self.complete_anthropic(system, prompt).await,
                    BackendKind::Ollama => self.complete_ollama(system, prompt).await,
                }
            })
            .await?;
        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            chars = output.len(),
            "Completion finished"
        );
        Ok(output)
    }

    async fn complete_openai(&self, system: &str, prompt: &str) -> FlowsmithResult<String> {
        let url = resolve_chat_endpoint(self.config.endpoint.as_deref(), DEFAULT_OPENAI_ENDPOINT);

        let mut payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        let mut request = self.client.post(&url).json(&payload);
        if let Some(api_key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(api_key);
        }
        let response = send(request, "openai").await?;

        let body: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| FlowsmithError::remote(None, format!("invalid openai response: {}", e)))?;
        let choice = body
            .choices
            .first()
            .ok_or_else(|| FlowsmithError::remote(None, "openai response did not include choices"))?;

        Ok(extract_text(&choice.message.content).trim().to_string())
    }

    async fn complete_anthropic(&self, system: &str, prompt: &str) -> FlowsmithResult<String> {
        let url = resolve_messages_endpoint(self.config.endpoint.as_deref(), DEFAULT_ANTHROPIC_ENDPOINT);

        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "system": system,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }

        let request = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload);
        let response = send(request, "anthropic").await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| FlowsmithError::remote(None, format!("invalid anthropic response: {}", e)))?;

        let output = body
            .content
            .iter()
            .filter(|part| part.content_type == "text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output.trim().to_string())
    }

    async fn complete_ollama(&self, system: &str, prompt: &str) -> FlowsmithResult<String> {
        let endpoint = self.config.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_ENDPOINT);
        let url = format!("{}/api/generate", endpoint.trim_end_matches('/'));

        let mut payload = json!({
            "model": self.config.model,
            "system": system,
            "prompt": prompt,
            "stream": false,
        });
        let mut options = serde_json::Map::new();
        if let Some(temp) = self.config.temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tokens) = self.config.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }
        if !options.is_empty() {
            payload["options"] = Value::Object(options);
        }

        let response = send(self.client.post(&url).json(&payload), "ollama").await?;
        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| FlowsmithError::remote(None, format!("invalid ollama response: {}", e)))?;
        Ok(body.response.trim().to_string())
    }
}

#[async_trait]
impl FlowGenerator for LlmClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        context: &[ContextSnippet],
    ) -> FlowsmithResult<GenerationOutput> {
        let output = self
            .complete(&generation_instructions(), &request.render(context))
            .await?;
        Ok(GenerationOutput::Text(output))
    }
}

#[async_trait]
impl RepairCollaborator for LlmClient {
    async fn repair(&self, request: &RepairRequest) -> FlowsmithResult<String> {
        self.complete(REPAIR_INSTRUCTIONS, &request.render()).await
    }
}

fn build_http_client(timeout: Duration) -> FlowsmithResult<Client> {
    let mut builder = Client::builder().timeout(timeout);
    let allow_system_proxy = std::env::var("FLOWSMITH_USE_SYSTEM_PROXY")
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    if !allow_system_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|e| FlowsmithError::Config(format!("failed to build HTTP client: {}", e)))
}

async fn send(request: reqwest::RequestBuilder, backend: &str) -> FlowsmithResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| FlowsmithError::Network(format!("{} request failed: {}", backend, e)))?;

    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after.as_deref())
        .into_error(status, format!("{} error: {}", backend, truncate(&body, 320))))
}

fn resolve_chat_endpoint(endpoint: Option<&str>, default_endpoint: &str) -> String {
    let endpoint = endpoint.unwrap_or(default_endpoint);
    if endpoint.contains("/chat/completions") {
        endpoint.to_string()
    } else {
        format!("{}/chat/completions", endpoint.trim_end_matches('/'))
    }
}

fn resolve_messages_endpoint(endpoint: Option<&str>, default_endpoint: &str) -> String {
    let endpoint = endpoint.unwrap_or(default_endpoint);
    if endpoint.ends_with("/messages") {
        endpoint.to_string()
    } else {
        format!("{}/messages", endpoint.trim_end_matches('/'))
    }
}

fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(
            resolve_chat_endpoint(Some("http://localhost:8080/v1/"), DEFAULT_OPENAI_ENDPOINT),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(resolve_chat_endpoint(None, DEFAULT_OPENAI_ENDPOINT), DEFAULT_OPENAI_ENDPOINT);
        assert_eq!(
            resolve_messages_endpoint(Some("https://proxy.internal/v1"), DEFAULT_ANTHROPIC_ENDPOINT),
            "https://proxy.internal/v1/messages"
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let parts = json!([{"type": "text", "text": "Node Number,"}, {"type": "text", "text": "1,D"}]);
        assert_eq!(extract_text(&parts), "Node Number,\n1,D");
        assert_eq!(extract_text(&json!(null)), "");
    }

    #[test]
    fn test_truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn test_hosted_backends_require_a_key() {
        let missing = LlmClient::new(ModelConfig::default());
        assert!(matches!(missing, Err(FlowsmithError::Config(_))));

        let local = LlmClient::new(ModelConfig {
            kind: BackendKind::Ollama,
            ..ModelConfig::default()
        });
        assert!(local.is_ok());
    }

    #[test]
    fn test_backend_kind_names() {
        let kind: BackendKind = serde_json::from_value(json!("openai")).unwrap();
        assert_eq!(kind, BackendKind::OpenAi);
        let kind: BackendKind = serde_json::from_value(json!("anthropic")).unwrap();
        assert_eq!(kind, BackendKind::Anthropic);
    }
}
