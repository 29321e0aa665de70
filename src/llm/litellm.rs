//! LiteLLM-compatible client implementation for prompt-forge.
//!
//! This module provides the text-generation boundary: the [`LlmProvider`]
//! trait every engine talks to, the request/response types, and a client
//! for any OpenAI-compatible chat-completions endpoint (LiteLLM, OpenRouter).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default OpenRouter endpoint used by [`LiteLlmClient::new_with_defaults`].
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Model used when neither the request nor the environment names one.
pub const DEFAULT_MODEL: &str = "anthropic/claude-opus-4.5";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling options attached to every request an engine sends.
///
/// The optimizer never interprets these; they are forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Model identifier. Empty means "provider default".
    pub model: String,
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter (0.0 - 1.0).
    pub top_p: Option<f64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: Some(0.7),
            max_tokens: Some(2048),
            top_p: None,
        }
    }
}

impl GenerationOptions {
    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Build a request carrying these options and the given messages.
    pub fn request(&self, messages: Vec<Message>) -> GenerationRequest {
        GenerationRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier to use for generation.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0). Higher values = more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            top_p: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Text of the last user message, if any.
    pub fn user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
}

impl GenerationResponse {
    /// Build a single-choice response; used by in-process providers.
    pub fn from_text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
        }
    }

    /// Get the content of the first choice, if available and non-blank.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .filter(|content| !content.trim().is_empty())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Client for LiteLLM-compatible APIs.
pub struct LiteLlmClient {
    /// Base URL for the API.
    api_base: String,
    /// Optional API key for authentication.
    api_key: Option<String>,
    /// Default model to use for requests.
    default_model: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl std::fmt::Debug for LiteLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteLlmClient")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl LiteLlmClient {
    /// Create a new LiteLLM client with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL for the LiteLLM API (e.g., "http://localhost:4000")
    /// * `api_key` - Optional API key for authentication
    /// * `default_model` - Default model to use when none is specified
    pub fn new(
        api_base: String,
        api_key: Option<String>,
        default_model: String,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            http_client: build_http_client(DEFAULT_HTTP_TIMEOUT)?,
        })
    }

    /// Create a new client pre-configured for OpenRouter.
    pub fn new_with_defaults(api_key: String) -> Result<Self, LlmError> {
        Self::new(
            OPENROUTER_API_BASE.to_string(),
            Some(api_key),
            DEFAULT_MODEL.to_string(),
        )
    }

    /// Create a new LiteLLM client from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `LITELLM_API_BASE`: Base URL for the API (required)
    /// - `LITELLM_API_KEY`: API key for authentication (optional)
    /// - `LITELLM_DEFAULT_MODEL`: Default model (defaults to [`DEFAULT_MODEL`])
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiBase` if `LITELLM_API_BASE` is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("LITELLM_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("LITELLM_API_KEY").ok();
        let default_model =
            env::var("LITELLM_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self::new(api_base, api_key, default_model)
    }

    /// Replace the HTTP timeout applied to every request.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.http_client = build_http_client(timeout)?;
        Ok(self)
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed(format!("Failed to build HTTP client: {}", e)))
}

/// Internal request structure for the OpenAI-compatible API.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

/// Internal response structure from the OpenAI-compatible API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let api_request = ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!(url = %url, model = %api_request.model, "Sending generation request");

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Title", "prompt-forge");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();

            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|parsed| parsed.error.message)
                .unwrap_or(error_text);

            if status_code == 429 {
                return Err(LlmError::RateLimited(message));
            }

            return Err(LlmError::ApiError {
                code: status_code,
                message,
            });
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        Ok(GenerationResponse {
            id: api_response.id,
            model: api_response.model,
            choices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let system = Message::system("You are a strict grader.");
        assert_eq!(system.role, "system");
        assert_eq!(system.content, "You are a strict grader.");

        let user = Message::user("Assess this prompt");
        assert_eq!(user.role, "user");

        let assistant = Message::assistant("{}");
        assert_eq!(assistant.role, "assistant");
    }

    #[test]
    fn test_generation_options_request() {
        let options = GenerationOptions::default()
            .with_model("gpt-4")
            .with_temperature(0.2)
            .with_max_tokens(512);

        let request = options.request(vec![Message::system("s"), Message::user("u")]);

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.top_p, None);
        assert_eq!(request.user_text(), Some("u"));
    }

    #[test]
    fn test_first_content_skips_blank() {
        let response = GenerationResponse::from_text("mock", "  \n ");
        assert_eq!(response.first_content(), None);

        let response = GenerationResponse::from_text("mock", "hello");
        assert_eq!(response.first_content(), Some("hello"));

        let empty = GenerationResponse {
            id: "id".to_string(),
            model: "mock".to_string(),
            choices: vec![],
        };
        assert_eq!(empty.first_content(), None);
    }

    #[test]
    fn test_litellm_client_new() {
        let client = LiteLlmClient::new(
            "http://localhost:4000/".to_string(),
            Some("test-key".to_string()),
            "gpt-4".to_string(),
        )
        .expect("client should build");

        assert_eq!(client.api_base(), "http://localhost:4000");
        assert_eq!(client.default_model(), "gpt-4");
        assert!(client.has_api_key());
    }

    #[test]
    fn test_litellm_client_new_with_defaults() {
        let client =
            LiteLlmClient::new_with_defaults("test-api-key".to_string()).expect("client builds");

        assert_eq!(client.api_base(), OPENROUTER_API_BASE);
        assert_eq!(client.default_model(), DEFAULT_MODEL);
        assert!(client.has_api_key());
    }

    #[tokio::test]
    async fn test_litellm_client_generate_connection_error() {
        let client = LiteLlmClient::new(
            "http://localhost:65535".to_string(),
            None,
            "gpt-4".to_string(),
        )
        .expect("client should build");

        let request = GenerationRequest::new("gpt-4", vec![Message::user("test")]);
        let err = client
            .generate(request)
            .await
            .expect_err("no server is listening");

        assert!(matches!(err, LlmError::RequestFailed(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_api_request_serialization() {
        let request = ApiRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("test")],
            temperature: Some(0.7),
            max_tokens: Some(1000),
            top_p: None,
        };

        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"model\":\"gpt-4\""));
        assert!(json.contains("\"temperature\":0.7"));
        assert!(!json.contains("top_p"));
    }

    #[test]
    fn test_api_response_tolerates_null_content() {
        let body = r#"{"id":"x","model":"m","choices":[{"index":0,"message":{"role":"assistant","content":null},"finish_reason":null}]}"#;
        let parsed: ApiResponse = serde_json::from_str(body).expect("should parse");
        assert_eq!(parsed.choices.len(), 1);
        assert!(parsed.choices[0].message.content.is_none());
    }
}
