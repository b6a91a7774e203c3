//! Pure REST client for OpenAI-compatible LLM APIs
//!
//! A clean, minimal client for chat completions, function calling and
//! embeddings with no domain-specific logic. Works against any
//! OpenAI-compatible endpoint (OpenAI itself, Groq, proxies).
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{LlmClient, ChatRequest, Message};
//!
//! let client = LlmClient::openai(api_key);
//!
//! // Chat completion
//! let response = client.chat_completion(
//!     ChatRequest::new("gpt-4o")
//!         .message(Message::user("Hello!"))
//!         .temperature(0.0),
//! ).await?;
//!
//! // Embeddings
//! let vector = client.create_embedding("text to embed", "text-embedding-3-small").await?;
//! ```

pub mod error;
pub mod files;
pub mod tool;
pub mod types;

pub use error::{LlmError, Result};
pub use files::{build_content_parts, FileInput};
pub use tool::{ToolCall, ToolDefinition};
pub use types::*;

use reqwest::Client;
use tracing::{debug, warn};

/// Base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of Groq's OpenAI-compatible API.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// REST client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct LlmClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    /// Create a new client with the given API key against the OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Client against the OpenAI API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(api_key)
    }

    /// Client against Groq's OpenAI-compatible API.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new(api_key).with_base_url(GROQ_BASE_URL)
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    ///
    /// Send messages to the chat completion API and get a response.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat completion request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "chat completion API error");
            return Err(LlmError::Api(format!("chat completion error: {error_text}")));
        }

        let chat_response: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let usage = chat_response.usage.clone();
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Api("no completion returned".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "chat completion"
        );

        Ok(ChatResponse { content, usage })
    }

    /// Function calling (tool use).
    ///
    /// Send messages with tool definitions and get tool calls or content back.
    pub async fn function_calling(&self, request: FunctionRequest) -> Result<FunctionResponse> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "function calling request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "tools API error");
            return Err(LlmError::Api(format!("tools API error: {error_text}")));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let usage = response_json
            .get("usage")
            .and_then(|u| serde_json::from_value(u.clone()).ok());

        Ok(FunctionResponse {
            message: response_json["choices"][0]["message"].clone(),
            usage,
        })
    }

    /// Create an embedding for a single text.
    pub async fn create_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let mut vectors = self.create_embeddings(&[text], model).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::Api("no embedding returned".into()))
    }

    /// Create embeddings for multiple texts in a single request.
    ///
    /// Either every input is embedded or the call fails; a partial batch is
    /// never returned.
    pub async fn create_embeddings(&self, texts: &[&str], model: &str) -> Result<Vec<Vec<f32>>> {
        let request = types::EmbeddingRequest {
            model: model.to_string(),
            input: texts.iter().map(|t| t.to_string()).collect(),
        };

        let response = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "embedding request failed");
                LlmError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(error = %error_text, "embedding API error");
            return Err(LlmError::Api(format!("embedding error: {error_text}")));
        }

        let embed_response: types::EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if embed_response.data.len() != texts.len() {
            return Err(LlmError::Api(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embed_response.data.len()
            )));
        }

        Ok(embed_response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = LlmClient::new("sk-test").with_base_url("https://custom.api.com");

        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url, "https://custom.api.com");
    }

    #[test]
    fn test_groq_base_url() {
        let client = LlmClient::groq("gsk-test");
        assert_eq!(client.base_url(), GROQ_BASE_URL);
    }
}
